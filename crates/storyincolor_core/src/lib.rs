pub mod domain;
pub mod notify;
pub mod ports;
pub mod session;
pub mod wizard;

pub use domain::{
    AdminPolicy, ArtStyle, AuthUser, CheckoutRequest, CheckoutSession, Page, ProductType, Project,
    ProjectPatch, ProjectStatus, StoredObject, UserProfile,
};
pub use notify::{NotificationKind, Notifier};
pub use ports::{
    FunctionInvoker, IdentityProvider, ObjectStore, PaymentGateway, PortError, PortResult,
    ProjectStore, ProviderSignIn,
};
pub use session::{IdentitySession, SessionPhase};
pub use wizard::{Ingest, MoveDirection, WizardSession, WizardStep};
