pub mod attach_file;
pub mod create_resource;
pub mod delete_resource;
pub mod list_inverse;
pub mod read_resource;
pub mod verify_file;

pub use attach_file::{AttachFileOperation, AttachFileOperationRequest, AttachFileOperationResult};
pub use create_resource::{
    CreateResourceOperation, CreateResourceOperationRequest, CreateResourceOperationResult,
};
pub use delete_resource::{
    DeleteResourceOperation, DeleteResourceOperationOutcome, DeleteResourceOperationRequest,
    DeleteResourceOperationResult,
};
pub use list_inverse::{
    ListInverseOperation, ListInverseOperationRequest, ListInverseOperationResult,
};
pub use read_resource::{
    ReadResourceOperation, ReadResourceOperationOutcome, ReadResourceOperationRequest,
    ReadResourceOperationResult,
};
pub use verify_file::{
    VerifyFileOperation, VerifyFileOperationOutcome, VerifyFileOperationRequest,
    VerifyFileOperationResult,
};
