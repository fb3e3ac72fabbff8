//! Streak table report.
//!
//! One line per streak value, ascending: `<streak>\t<mean>,<games>`. Both the mean and
//! the game count are printed as doubles (`0.375,8.0`).

use std::fs;
use std::path::Path;

use crate::error::Result;
use crate::streak::StreakStat;

/// Render the report.
#[must_use]
pub fn format_report(stats: &[StreakStat]) -> String {
    let mut sorted: Vec<&StreakStat> = stats.iter().collect();
    sorted.sort_by_key(|s| s.streak);

    let mut out = String::new();
    for stat in sorted {
        #[allow(clippy::cast_precision_loss)]
        let games = stat.games as f64;
        // Debug formatting keeps the fractional part of whole numbers ("1.0").
        out.push_str(&format!("{}\t{:?},{:?}\n", stat.streak, stat.mean, games));
    }
    out
}

/// Write the report to `path`, creating parent directories.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_report(path: &Path, stats: &[StreakStat]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format_report(stats))?;
    tracing::info!(path = %path.display(), lines = stats.len(), "Wrote streak report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stat(streak: i32, wins: u64, games: u64) -> StreakStat {
        #[allow(clippy::cast_precision_loss)]
        let mean = wins as f64 / games as f64;
        StreakStat {
            streak,
            mean,
            games,
            wins,
        }
    }

    #[test]
    fn report_lines() {
        let report = format_report(&[stat(2, 1, 1), stat(-1, 3, 8), stat(0, 1, 2)]);
        assert_eq!(report, "-1\t0.375,8.0\n0\t0.5,2.0\n2\t1.0,1.0\n");
    }

    #[test]
    fn writes_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out").join("streaks.tsv");
        write_report(&path, &[stat(1, 3, 8)]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "1\t0.375,8.0\n");
    }
}
