pub mod course;
pub mod enrollment;
pub mod payment;
