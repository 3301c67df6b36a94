//! `bottalk version` output
//!
//! Build details are embedded by `build.rs` as `BOTTALK_*` variables.

use std::fmt;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git revision the binary was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revision {
    pub hash: &'static str,
    pub branch: &'static str,
    pub dirty: bool,
}

impl Revision {
    pub fn embedded() -> Self {
        Self {
            hash: env!("BOTTALK_GIT_HASH"),
            branch: env!("BOTTALK_GIT_BRANCH"),
            dirty: env!("BOTTALK_GIT_DIRTY") == "true",
        }
    }
}

impl fmt::Display for Revision {
    /// `0.1.0-abc1234`, with `-dirty` appended for uncommitted builds
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", VERSION, self.hash)?;
        if self.dirty {
            f.write_str("-dirty")?;
        }
        Ok(())
    }
}

/// The text printed by `bottalk version`
pub fn report() -> String {
    let revision = Revision::embedded();
    let rows = [
        ("Version", VERSION.to_string()),
        ("Git Hash", format!("{} ({})", revision.hash, revision.branch)),
        (
            "Built",
            format!(
                "{} [{}]",
                env!("BOTTALK_BUILD_TIMESTAMP"),
                env!("BOTTALK_PROFILE")
            ),
        ),
        (
            "Target",
            format!("{} (host {})", env!("BOTTALK_TARGET"), env!("BOTTALK_HOST")),
        ),
        ("Compiler", env!("BOTTALK_RUSTC_VERSION").to_string()),
    ];

    let mut out = format!("{} {}\n\nBuild Information:\n", env!("CARGO_PKG_NAME"), revision);
    for (label, value) in rows {
        out.push_str(&format!("  {:<10}{}\n", format!("{}:", label), value));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_tag() {
        let clean = Revision {
            hash: "abc1234",
            branch: "main",
            dirty: false,
        };
        assert_eq!(clean.to_string(), format!("{}-abc1234", VERSION));

        let dirty = Revision { dirty: true, ..clean };
        assert!(dirty.to_string().ends_with("-abc1234-dirty"));
    }

    #[test]
    fn test_report_lists_build_details() {
        let report = report();
        assert!(report.starts_with("bottalk "));
        for label in ["Build Information:", "Version:", "Git Hash:", "Built:", "Target:", "Compiler:"] {
            assert!(report.contains(label), "missing {}", label);
        }
    }
}
