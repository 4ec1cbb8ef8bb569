use uuid::Uuid;

use crate::auth::{CallerIdentity, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Read,
    Modify,
}

/// The ownership facts of a resource, as seen by the authorization check.
/// Relationship facts the predicate cannot derive itself (whether the
/// calling doctor treats a patient) are computed by the caller and passed in.
#[derive(Debug, Clone)]
pub enum Resource {
    Appointment { patient_id: Uuid, doctor_id: Uuid },
    Prescription { patient_id: Uuid, doctor_id: Uuid },
    MedicalRecord { patient_id: Uuid, doctor_id: Uuid },
    PatientProfile { patient_id: Uuid, treated_by_caller: bool },
    DoctorProfile { doctor_id: Uuid },
}

/// Decide whether `identity` may perform `action` on `resource`.
///
/// Patients own resources matched by their resolved profile id, doctors own
/// resources assigned to their doctor id, admins bypass every check. A
/// denial here is a permission failure, distinct from the resource not
/// existing.
pub fn can_access(identity: &CallerIdentity, action: Action, resource: &Resource) -> bool {
    if identity.is_admin() {
        return true;
    }

    match resource {
        Resource::Appointment { patient_id, doctor_id }
        | Resource::Prescription { patient_id, doctor_id }
        | Resource::MedicalRecord { patient_id, doctor_id } => match identity.role {
            Role::Patient => identity.patient_id() == Some(*patient_id),
            Role::Doctor => identity.doctor_id() == Some(*doctor_id),
            Role::Admin => true,
        },
        Resource::PatientProfile { patient_id, treated_by_caller } => match identity.role {
            Role::Patient => identity.patient_id() == Some(*patient_id),
            // A doctor may look at a patient's profile only through an
            // existing appointment relationship, and never modify it.
            Role::Doctor => action == Action::Read && *treated_by_caller,
            Role::Admin => true,
        },
        Resource::DoctorProfile { doctor_id } => match action {
            // Doctor profiles are visible to any authenticated caller.
            Action::Read => true,
            Action::Modify => identity.doctor_id() == Some(*doctor_id),
        },
    }
}
