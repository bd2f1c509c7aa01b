use serde::{Deserialize, Serialize};

use super::input::InputError;

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// The literal is also the serde wire spelling.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }

            /// Case-insensitive match ignoring spaces, hyphens and underscores.
            /// Model output is loose about spelling ("follow up", "LOW_EVIDENCE").
            pub fn parse_lenient(value: &str) -> Option<Self> {
                let wanted = squash(value);
                [$(Self::$variant),+]
                    .into_iter()
                    .find(|v| squash(v.as_str()) == wanted)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = InputError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InputError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

fn squash(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

str_enum!(PatientSex {
    Male => "male",
    Female => "female",
    Other => "other",
});

str_enum!(Likelihood {
    High => "High",
    Moderate => "Moderate",
    Low => "Low",
});

str_enum!(GuidelineCategory {
    Workup => "Workup",
    Management => "Management",
    Monitoring => "Monitoring",
    FollowUp => "Follow-up",
    Other => "Other",
});

str_enum!(EvidenceConfidence {
    Direct => "Direct",
    Inferred => "Inferred",
    LowEvidence => "Low-evidence",
});
