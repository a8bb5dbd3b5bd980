use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditOutcome, AuditSink};
use crate::flows::states::{FlowAction, TransitionOutcome, WizardEvent, WizardStep};

pub trait FlowDefinition {
    fn initial_step(&self) -> WizardStep;
    fn transition(
        &self,
        current: WizardStep,
        event: WizardEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// Personal details, quotation, emission, then confirmation.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuotationWizardFlow;

impl FlowDefinition for QuotationWizardFlow {
    fn initial_step(&self) -> WizardStep {
        WizardStep::PersonalDetails
    }

    fn transition(
        &self,
        current: WizardStep,
        event: WizardEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_quotation_wizard(current, event)
    }
}

#[derive(Clone, Debug)]
pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_step(&self) -> WizardStep {
        self.flow.initial_step()
    }

    pub fn apply(
        &self,
        current: WizardStep,
        event: WizardEvent,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event)
    }

    pub fn apply_with_audit<S>(
        &self,
        current: WizardStep,
        event: WizardEvent,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.apply(current, event);
        match &result {
            Ok(outcome) => {
                sink.emit(
                    audit
                        .event(
                            "wizard.transition_applied",
                            AuditCategory::Wizard,
                            AuditOutcome::Success,
                        )
                        .with_metadata("from", outcome.from.as_str())
                        .with_metadata("to", outcome.to.as_str())
                        .with_metadata("event", format!("{:?}", outcome.event)),
                );
            }
            Err(error) => {
                sink.emit(
                    audit
                        .event(
                            "wizard.transition_rejected",
                            AuditCategory::Wizard,
                            AuditOutcome::Rejected,
                        )
                        .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }
}

impl Default for FlowEngine<QuotationWizardFlow> {
    fn default() -> Self {
        Self::new(QuotationWizardFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: WizardStep, event: WizardEvent },
}

fn transition_quotation_wizard(
    current: WizardStep,
    event: WizardEvent,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use FlowAction::{
        EnsureOperationId, MergeOpportunityClose, MergePersonalDetails, MergeQuotation,
        NotifyFailure, RecordResponse, ResetSession, SyncOpportunity, SyncQuotation,
    };
    use WizardEvent::{
        BackRequested, OpportunitySyncFailed, OpportunitySynced, QuotationSyncFailed,
        QuotationSynced, StartOverRequested, Submitted,
    };
    use WizardStep::{Confirmation, Emission, PersonalDetails, Quotation};

    let (to, actions) = match (current, event) {
        (PersonalDetails, Submitted) => (Quotation, vec![MergePersonalDetails]),
        // Merge lands before the sync, so a failed sync still keeps the edits.
        (Quotation, Submitted) => (Quotation, vec![MergeQuotation, SyncQuotation]),
        (Quotation, QuotationSynced) => (Emission, Vec::new()),
        (Quotation, QuotationSyncFailed) => (Quotation, vec![NotifyFailure]),
        (Emission, Submitted) => (Emission, vec![MergeOpportunityClose, SyncOpportunity]),
        (Emission, OpportunitySynced) => (Confirmation, vec![RecordResponse]),
        // Intentional: a failed opportunity update still reaches confirmation, unlike the
        // quotation step, so the user sees the failure payload instead of a blocked form.
        (Emission, OpportunitySyncFailed) => (Confirmation, vec![RecordResponse, NotifyFailure]),
        (Quotation, BackRequested) => (PersonalDetails, Vec::new()),
        (Emission, BackRequested) => (Quotation, Vec::new()),
        (Confirmation, StartOverRequested) => (PersonalDetails, vec![ResetSession, EnsureOperationId]),
        _ => return Err(FlowTransitionError::InvalidTransition { state: current, event }),
    };

    Ok(TransitionOutcome { from: current, to, event, actions })
}
