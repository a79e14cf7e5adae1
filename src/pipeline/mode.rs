use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Analysis category selected by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Motion,
    Object,
    Both,
}

impl AnalysisMode {
    pub const ALL: [AnalysisMode; 3] = [AnalysisMode::Motion, AnalysisMode::Object, AnalysisMode::Both];

    pub fn includes_motion(self) -> bool {
        match self {
            AnalysisMode::Motion | AnalysisMode::Both => true,
            AnalysisMode::Object => false,
        }
    }

    pub fn includes_objects(self) -> bool {
        match self {
            AnalysisMode::Object | AnalysisMode::Both => true,
            AnalysisMode::Motion => false,
        }
    }

    /// Next mode in selection order, wrapping around
    pub fn next(self) -> Self {
        match self {
            AnalysisMode::Motion => AnalysisMode::Object,
            AnalysisMode::Object => AnalysisMode::Both,
            AnalysisMode::Both => AnalysisMode::Motion,
        }
    }

    /// Label shown to users
    pub fn title(self) -> &'static str {
        match self {
            AnalysisMode::Motion => "Motion Detection",
            AnalysisMode::Object => "Object Recognition",
            AnalysisMode::Both => "Both",
        }
    }
}

impl Default for AnalysisMode {
    fn default() -> Self {
        AnalysisMode::Motion
    }
}

impl fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnalysisMode::Motion => "motion",
            AnalysisMode::Object => "object",
            AnalysisMode::Both => "both",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for AnalysisMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "motion" | "motion detection" => Ok(AnalysisMode::Motion),
            "object" | "objects" | "object recognition" => Ok(AnalysisMode::Object),
            "both" => Ok(AnalysisMode::Both),
            other => Err(format!(
                "unknown analysis mode '{}', expected motion, object or both",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_categories() {
        assert!(AnalysisMode::Motion.includes_motion());
        assert!(!AnalysisMode::Motion.includes_objects());
        assert!(!AnalysisMode::Object.includes_motion());
        assert!(AnalysisMode::Object.includes_objects());
        assert!(AnalysisMode::Both.includes_motion());
        assert!(AnalysisMode::Both.includes_objects());
    }

    #[test]
    fn test_mode_parsing() {
        for mode in AnalysisMode::ALL {
            assert_eq!(mode.to_string().parse::<AnalysisMode>(), Ok(mode));
        }
        assert_eq!("Object Recognition".parse(), Ok(AnalysisMode::Object));
        assert!("everything".parse::<AnalysisMode>().is_err());
    }

    #[test]
    fn test_mode_cycle_visits_all() {
        let mut mode = AnalysisMode::Motion;
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(mode);
            mode = mode.next();
        }
        assert_eq!(seen, AnalysisMode::ALL.to_vec());
        assert_eq!(mode, AnalysisMode::Motion);
    }
}
