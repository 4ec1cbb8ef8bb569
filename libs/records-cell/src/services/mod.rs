pub mod medical_records;
pub mod prescriptions;

pub use medical_records::MedicalRecordService;
pub use prescriptions::PrescriptionService;
