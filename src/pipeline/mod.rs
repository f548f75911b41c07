pub mod extraction;
pub mod routing;
pub mod batch;
