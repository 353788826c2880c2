use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(SpaceId);
id_newtype!(AgentId);
id_newtype!(DriveId);

/// Top-level navigation mode. Closed set: anything else is not a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MainSection {
    Drives,
    Agents,
    Spaces,
}

impl MainSection {
    pub const ALL: [MainSection; 3] = [
        MainSection::Drives,
        MainSection::Agents,
        MainSection::Spaces,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MainSection::Drives => "drives",
            MainSection::Agents => "agents",
            MainSection::Spaces => "spaces",
        }
    }

    /// Fail-soft lookup: unknown tokens are simply not a main section.
    pub fn parse(token: &str) -> Option<MainSection> {
        match token {
            "drives" => Some(MainSection::Drives),
            "agents" => Some(MainSection::Agents),
            "spaces" => Some(MainSection::Spaces),
            _ => None,
        }
    }
}
