pub mod cleanup;
pub mod image_ops;
pub mod invoker;
pub mod packager;
pub mod pdf_ops;
pub mod staging;
