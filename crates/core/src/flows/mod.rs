pub mod controller;
pub mod engine;
pub mod states;

pub use controller::{
    ConfirmationView, Notice, NoticeLevel, SubmissionPlan, SyncRequest, WizardController,
    WizardSnapshot,
};
pub use engine::{FlowDefinition, FlowEngine, FlowTransitionError, QuotationWizardFlow};
pub use states::{
    progress_markers, FlowAction, StepMarker, StepProgress, TransitionOutcome, WizardEvent,
    WizardStep,
};
