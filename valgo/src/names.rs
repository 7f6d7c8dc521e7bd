//! Synthetic name generation

/// Monotonic temporary-name source, one per lowering run
#[derive(Debug)]
pub struct TempNames {
    prefix: String,
    next: usize,
    matched: usize,
}

impl TempNames {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
            matched: 0,
        }
    }

    /// `_tmp0`, `_tmp1`, ...
    pub fn fresh(&mut self) -> String {
        let name = format!("{}{}", self.prefix, self.next);
        self.next += 1;
        name
    }

    /// Done flag of a statement-position match chain: `_matched0`, ...
    pub fn matched_flag(&mut self) -> String {
        let name = format!("_matched{}", self.matched);
        self.matched += 1;
        name
    }

    /// Name of the standalone function a method is extracted into
    pub fn extracted(receiver: &str, method: &str) -> String {
        format!("{receiver}_{method}")
    }

    /// Name of a sealed variant's tag constant: `Shape_Circle`
    pub fn variant_tag(sealed: &str, variant: &str) -> String {
        format!("{sealed}_{variant}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_names_are_distinct() {
        let mut names = TempNames::new("_tmp");
        assert_eq!(names.fresh(), "_tmp0");
        assert_eq!(names.fresh(), "_tmp1");
        assert_eq!(names.matched_flag(), "_matched0");
        assert_eq!(names.fresh(), "_tmp2");
    }

    #[test]
    fn test_derived_names() {
        assert_eq!(TempNames::extracted("Box", "Map"), "Box_Map");
        assert_eq!(TempNames::variant_tag("Shape", "Circle"), "Shape_Circle");
    }
}
