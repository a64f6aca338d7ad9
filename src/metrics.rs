//! Dashboard numbers, recomputed from the client list already in memory.

use crate::models::{Client, ClientStatus, OnboardingStage};

/// Cells in one heatmap strip.
pub const HEAT_CELLS: usize = 5;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineMetrics {
    pub total: usize,
    by_status: [usize; ClientStatus::ALL.len()],
    by_stage: [usize; OnboardingStage::ALL.len()],
}

impl PipelineMetrics {
    pub fn from_clients(clients: &[Client]) -> Self {
        let mut metrics = PipelineMetrics {
            total: clients.len(),
            ..Self::default()
        };

        for client in clients {
            metrics.by_status[status_index(client.status)] += 1;
            metrics.by_stage[stage_index(client.onboarding_stage)] += 1;
        }
        metrics
    }

    pub fn status_count(&self, status: ClientStatus) -> usize {
        self.by_status[status_index(status)]
    }

    pub fn stage_count(&self, stage: OnboardingStage) -> usize {
        self.by_stage[stage_index(stage)]
    }

    pub fn statuses(&self) -> impl Iterator<Item = (ClientStatus, usize)> + '_ {
        ClientStatus::ALL
            .into_iter()
            .map(|status| (status, self.status_count(status)))
    }

    pub fn stages(&self) -> impl Iterator<Item = (OnboardingStage, usize)> + '_ {
        OnboardingStage::ALL
            .into_iter()
            .map(|stage| (stage, self.stage_count(stage)))
    }
}

fn status_index(status: ClientStatus) -> usize {
    match status {
        ClientStatus::InProgress => 0,
        ClientStatus::Blocked => 1,
        ClientStatus::Completed => 2,
    }
}

fn stage_index(stage: OnboardingStage) -> usize {
    match stage {
        OnboardingStage::Docs => 0,
        OnboardingStage::Setup => 1,
        OnboardingStage::Testing => 2,
        OnboardingStage::Live => 3,
    }
}

/// Lit cells for a stage with `count` clients.
pub fn heat_blocks(count: usize) -> usize {
    count.min(HEAT_CELLS)
}

/// Case-insensitive match on name or email. A blank term keeps everything.
pub fn filter_clients<'a>(clients: &'a [Client], term: &str) -> Vec<&'a Client> {
    let term = term.trim().to_lowercase();
    clients
        .iter()
        .filter(|c| {
            term.is_empty()
                || c.name.to_lowercase().contains(&term)
                || c.email.to_lowercase().contains(&term)
        })
        .collect()
}
