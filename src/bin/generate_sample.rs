use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use csv::{QuoteStyle, WriterBuilder};

/// Thermal voltage at 25 °C in V.
const THERMAL_VOLTAGE: f64 = 0.025_85;
/// AM1.5 irradiance in mW/cm².
const IRRADIANCE: f64 = 100.0;

#[derive(Parser)]
#[command(author, version, about = "Write synthetic SuSi measurement files")]
struct Args {
    /// Output directory
    #[arg(long, default_value = "sample_data")]
    out_dir: PathBuf,
    #[arg(long, default_value_t = 3)]
    files: usize,
    #[arg(long, default_value_t = 6)]
    pixels: u32,
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Single-diode cell without series resistance.
struct Diode {
    /// Photocurrent density, mA/cm².
    jph: f64,
    /// Saturation current density, mA/cm².
    j0: f64,
    ideality: f64,
    /// Shunt resistance, Ω·cm².
    r_shunt: f64,
}

impl Diode {
    fn current(&self, v: f64) -> f64 {
        let n_vt = self.ideality * THERMAL_VOLTAGE;
        self.jph - self.j0 * ((v / n_vt).exp() - 1.0) - 1000.0 * v / self.r_shunt
    }

    /// Voltage where the current crosses zero, by bisection.
    fn voc(&self) -> f64 {
        let (mut lo, mut hi) = (0.0, 2.0);
        for _ in 0..60 {
            let mid = 0.5 * (lo + hi);
            if self.current(mid) > 0.0 {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }
}

struct Sweep {
    jsc: f64,
    voc: f64,
    fill_factor: f64,
    efficiency: f64,
    currents: Vec<f64>,
}

fn sweep(diode: &Diode, voltages: &[f64], rng: &mut SampleRng, noise: f64) -> Sweep {
    let jsc = diode.current(0.0);
    let voc = diode.voc();
    // Maximum power point on a fine grid.
    let p_max = (0..=2000)
        .map(|i| {
            let v = voc * i as f64 / 2000.0;
            v * diode.current(v)
        })
        .fold(0.0, f64::max);
    let fill_factor = 100.0 * p_max / (jsc * voc);
    let efficiency = 100.0 * p_max / IRRADIANCE;
    let currents = voltages
        .iter()
        .map(|&v| diode.current(v) + rng.gauss(0.0, noise))
        .collect();

    Sweep {
        jsc,
        voc,
        fill_factor,
        efficiency,
        currents,
    }
}

/// Seeded SplitMix64 stream; the same seed always yields the same files.
struct SampleRng(u64);

impl SampleRng {
    fn uniform(&mut self) -> f64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;
        (z >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Normal deviate by Box-Muller.
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.uniform().max(f64::MIN_POSITIVE);
        let u2 = self.uniform();
        mean + std_dev * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }
}

fn write_file(path: &Path, index: usize, pixels: u32, rng: &mut SampleRng) -> anyhow::Result<()> {
    // -0.1 V .. 1.2 V in 20 mV steps
    let voltages: Vec<f64> = (0..=65).map(|i| -0.1 + i as f64 * 0.02).collect();
    let batch_jph = 20.0 + index as f64 * 0.8;

    let mut columns: Vec<(u32, &str, Sweep)> = Vec::new();
    for pixel in 1..=pixels {
        // Roughly one pixel in eight is damaged.
        let damage = if rng.uniform() < 0.125 { 0.45 } else { 1.0 };
        let base = Diode {
            jph: (batch_jph + rng.gauss(0.0, 0.4)) * damage,
            j0: 3.0e-11 * (1.0 + rng.uniform()),
            ideality: 1.5,
            r_shunt: 800.0 + 400.0 * rng.uniform(),
        };
        let forward = sweep(&base, &voltages, rng, 0.05);
        // Reverse scans of perovskite cells read slightly higher.
        let reverse_diode = Diode {
            jph: base.jph * 1.01,
            j0: base.j0 * 0.8,
            ..base
        };
        let reverse = sweep(&reverse_diode, &voltages, rng, 0.05);
        columns.push((pixel, "Fwd", forward));
        columns.push((pixel, "Rev", reverse));
    }

    let mut writer = WriterBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .quote_style(QuoteStyle::Never)
        .from_path(path)
        .with_context(|| format!("creating {}", path.display()))?;

    writer.write_record([format!("SuSi measurement {}", index + 1)])?;
    writer.write_record(["Sample ID:".to_string(), format!("Batch-{}", index + 1)])?;
    writer.write_record(["Active Area: 0.105 cm²"])?;
    writer.write_record([format!("Irradiance: {IRRADIANCE} mW/cm²")])?;
    writer.write_record(["Compliance: 20 mA"])?;

    let mut labels = vec!["Parameter".to_string()];
    labels.extend(columns.iter().map(|(p, d, _)| format!("Pixel {p} {d}")));
    writer.write_record(&labels)?;

    let rows: [(&str, fn(&Sweep) -> f64); 4] = [
        ("Jsc [mA/cm²]", |s| s.jsc),
        ("Voc [V]", |s| s.voc),
        ("FF [%]", |s| s.fill_factor),
        ("Eff [%]", |s| s.efficiency),
    ];
    for (label, value) in rows {
        let mut record = vec![label.to_string()];
        record.extend(columns.iter().map(|(_, _, s)| format!("{:.4}", value(s))));
        writer.write_record(&record)?;
    }

    let mut data_header = vec!["Voltage [V]".to_string()];
    data_header.extend(columns.iter().map(|(p, d, _)| format!("J P{p} {d}")));
    writer.write_record(&data_header)?;

    for (row, v) in voltages.iter().enumerate() {
        let mut record = vec![format!("{v:.3}")];
        record.extend(columns.iter().map(|(_, _, s)| format!("{:.5}", s.currents[row])));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut rng = SampleRng(args.seed);

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    for index in 0..args.files {
        let path = args.out_dir.join(format!("batch_{}.txt", index + 1));
        write_file(&path, index, args.pixels, &mut rng)?;
        println!("Wrote {} ({} pixels, fwd + rev)", path.display(), args.pixels);
    }
    Ok(())
}
