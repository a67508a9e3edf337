use crate::state::GenerationStatus;

/// Events exposed by `GenerationRun`.
#[derive(Clone, Debug, PartialEq)]
pub enum GenerationEvent {
    /// First event for every run.
    Started {
        run_id: uuid::Uuid,
        project_id: String,
    },
    /// A `progress:` or `message:` record was applied.
    Progress {
        run_id: uuid::Uuid,
        percent: u8,
        message: Option<String>,
    },
    /// Terminal event; exactly one per run.
    Finished {
        run_id: uuid::Uuid,
        status: GenerationStatus,
    },
}

impl GenerationEvent {
    pub fn run_id(&self) -> uuid::Uuid {
        match self {
            Self::Started { run_id, .. }
            | Self::Progress { run_id, .. }
            | Self::Finished { run_id, .. } => *run_id,
        }
    }
}
