//! Canonical workflow stages and the role → stage table.

use serde::{Deserialize, Serialize};

/// The five canonical roles in a workflow.
///
/// Stage numbers are stable and serialised as integers. `Dispatch` is always
/// the terminal verification role when present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Stage {
    Architect = 1,
    Builder = 2,
    Specialist = 3,
    Accelerator = 4,
    Dispatch = 5,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Architect,
        Stage::Builder,
        Stage::Specialist,
        Stage::Accelerator,
        Stage::Dispatch,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(n: u8) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| s.number() == n)
    }
}

impl From<Stage> for u8 {
    fn from(stage: Stage) -> u8 {
        stage.number()
    }
}

impl TryFrom<u8> for Stage {
    type Error = String;

    fn try_from(n: u8) -> std::result::Result<Self, Self::Error> {
        Stage::from_number(n).ok_or_else(|| format!("invalid stage number: {n}"))
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Architect => "architect",
            Stage::Builder => "builder",
            Stage::Specialist => "specialist",
            Stage::Accelerator => "accelerator",
            Stage::Dispatch => "dispatch",
        };
        write!(f, "{s}")
    }
}

/// Stages a registered role name can fulfil.
pub fn stages_for_role(role: &str) -> &'static [Stage] {
    match role {
        "claude" => &[Stage::Architect, Stage::Dispatch],
        "codex" => &[Stage::Builder],
        "ollama" => &[Stage::Specialist],
        "nim" => &[Stage::Accelerator],
        "dispatch" => &[Stage::Dispatch],
        _ => &[],
    }
}

/// Stage assigned to a strategy output key (`<name>_output` with the suffix
/// removed). Unrecognised names fall back to `Dispatch`.
pub fn stage_for_output(name: &str) -> Stage {
    match name {
        "claude" => Stage::Architect,
        "codex" | "build" | "attack" => Stage::Builder,
        "ollama" | "fuzz" => Stage::Specialist,
        _ => Stage::Dispatch,
    }
}

/// Named stage presets.
pub fn stage_preset(name: &str) -> Option<&'static [Stage]> {
    use Stage::*;
    let stages: &'static [Stage] = match name {
        "trivial" => &[Architect, Dispatch],
        "standard" => &[Architect, Builder, Dispatch],
        "security" => &[Architect, Builder, Specialist, Dispatch],
        "performance" => &[Architect, Builder, Accelerator, Dispatch],
        "full" => &[Architect, Builder, Specialist, Accelerator, Dispatch],
        "audit" => &[Architect, Specialist, Dispatch],
        _ => return None,
    };
    Some(stages)
}

/// Pick the stages to run.
///
/// A known preset wins over `requested`; with neither, `standard` is used.
/// The result keeps only stages present in `available`.
pub fn resolve_stages(
    requested: Option<&[Stage]>,
    available: &[Stage],
    preset: Option<&str>,
) -> Vec<Stage> {
    let chosen: &[Stage] = match (preset.and_then(stage_preset), requested) {
        (Some(stages), _) => stages,
        (None, Some(req)) if !req.is_empty() => req,
        _ => stage_preset("standard").unwrap_or(&[]),
    };
    chosen
        .iter()
        .copied()
        .filter(|s| available.contains(s))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_numbers_are_stable() {
        assert_eq!(Stage::Architect.number(), 1);
        assert_eq!(Stage::Dispatch.number(), 5);
        assert_eq!(Stage::from_number(4), Some(Stage::Accelerator));
        assert_eq!(Stage::from_number(9), None);
    }

    #[test]
    fn test_stage_serialises_as_integer() {
        let json = serde_json::to_string(&Stage::Specialist).unwrap();
        assert_eq!(json, "3");
        let back: Stage = serde_json::from_str("2").unwrap();
        assert_eq!(back, Stage::Builder);
        assert!(serde_json::from_str::<Stage>("0").is_err());
    }

    #[test]
    fn test_output_names_default_to_dispatch() {
        assert_eq!(stage_for_output("attack"), Stage::Builder);
        assert_eq!(stage_for_output("fuzz"), Stage::Specialist);
        assert_eq!(stage_for_output("architect"), Stage::Dispatch);
        assert_eq!(stage_for_output("whatever"), Stage::Dispatch);
    }

    #[test]
    fn test_preset_filters_unavailable_stages() {
        let available = [Stage::Architect, Stage::Builder, Stage::Dispatch];
        let stages = resolve_stages(None, &available, Some("full"));
        assert_eq!(stages, vec![Stage::Architect, Stage::Builder, Stage::Dispatch]);
    }

    #[test]
    fn test_unknown_preset_falls_back_to_request_then_standard() {
        let available = Stage::ALL;
        let req = [Stage::Architect, Stage::Specialist];
        assert_eq!(
            resolve_stages(Some(&req), &available, Some("nope")),
            vec![Stage::Architect, Stage::Specialist]
        );
        assert_eq!(
            resolve_stages(None, &available, None),
            vec![Stage::Architect, Stage::Builder, Stage::Dispatch]
        );
    }
}
