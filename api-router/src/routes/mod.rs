pub mod liveness;
pub mod ocr;
pub mod readiness;
pub mod result;
pub mod status;
pub mod upload;
