pub mod credentials;
pub mod transport;

pub use credentials::{
    CredentialStore, Credentials, LogoutHandler, MemoryCredentialStore, NoopLogoutHandler,
};
pub use transport::{
    expect_success, ApiRequest, AuthTransport, FilePart, MultipartBody, RequestBody,
    UploadProgress,
};
