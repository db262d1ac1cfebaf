/// Statistics over parsed files.
///
/// `summary` works on one file (parameter lists, best pixel); `distribution`
/// turns one value list per file into boxplot statistics.
pub mod distribution;
pub mod summary;
