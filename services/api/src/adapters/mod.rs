pub mod documents;
pub mod functions;
pub mod identity;
pub mod memory;
pub mod payments;
pub mod storage;

pub use documents::HttpDocumentStore;
pub use functions::HttpFunctionInvoker;
pub use identity::HttpIdentityProvider;
pub use memory::{
    InMemoryIdentityProvider, InMemoryObjectStore, InMemoryProjectStore,
    RecordingFunctionInvoker, StaticPaymentGateway,
};
pub use payments::HttpPaymentGateway;
pub use storage::HttpObjectStore;
