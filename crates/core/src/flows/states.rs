use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    PersonalDetails,
    Quotation,
    Emission,
    Confirmation,
}

impl WizardStep {
    /// Steps that render a form, in order.
    pub const FORM_STEPS: [Self; 3] = [Self::PersonalDetails, Self::Quotation, Self::Emission];

    pub fn number(&self) -> u8 {
        match self {
            Self::PersonalDetails => 1,
            Self::Quotation => 2,
            Self::Emission => 3,
            Self::Confirmation => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::PersonalDetails => "Personal details",
            Self::Quotation => "Quotation",
            Self::Emission => "Emission",
            Self::Confirmation => "Confirmation",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PersonalDetails => "personal_details",
            Self::Quotation => "quotation",
            Self::Emission => "emission",
            Self::Confirmation => "confirmation",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardEvent {
    /// Validated step input arrived.
    Submitted,
    QuotationSynced,
    QuotationSyncFailed,
    OpportunitySynced,
    OpportunitySyncFailed,
    BackRequested,
    StartOverRequested,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowAction {
    EnsureOperationId,
    MergePersonalDetails,
    MergeQuotation,
    SyncQuotation,
    MergeOpportunityClose,
    SyncOpportunity,
    RecordResponse,
    NotifyFailure,
    ResetSession,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: WizardStep,
    pub to: WizardStep,
    pub event: WizardEvent,
    pub actions: Vec<FlowAction>,
}

/// Display state of one step in the progress indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepProgress {
    Completed,
    Active,
    Pending,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMarker {
    pub number: u8,
    pub label: String,
    pub progress: StepProgress,
}

pub fn progress_markers(current: WizardStep) -> Vec<StepMarker> {
    WizardStep::FORM_STEPS
        .iter()
        .map(|step| {
            let progress = if step.number() < current.number() {
                StepProgress::Completed
            } else if *step == current {
                StepProgress::Active
            } else {
                StepProgress::Pending
            };
            StepMarker { number: step.number(), label: step.label().to_string(), progress }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{progress_markers, StepProgress, WizardStep};

    #[test]
    fn progress_marks_earlier_steps_completed() {
        let markers = progress_markers(WizardStep::Emission);
        let progress: Vec<_> = markers.iter().map(|marker| marker.progress).collect();
        assert_eq!(
            progress,
            vec![StepProgress::Completed, StepProgress::Completed, StepProgress::Active]
        );
        assert_eq!(markers[0].label, "Personal details");
    }

    #[test]
    fn confirmation_marks_every_form_step_completed() {
        assert!(progress_markers(WizardStep::Confirmation)
            .iter()
            .all(|marker| marker.progress == StepProgress::Completed));
    }
}
