//! Publishing a driver's ride offer.
//!
//! An offer touches three tables: the driver row, a new availability entry
//! and the driver's discount. The backend has no multi-table transaction,
//! so [`publish_offer`] runs the writes as a sequence of steps, each
//! recording how to undo itself. If a step fails, completed steps are
//! undone in reverse order.

use std::fmt;

use chrono::NaiveDate;

use crate::auth::Session;
use crate::backend::{Backend, BackendError};
use crate::domain::{
    Availability, Discount, DomainError, Driver, DriverId, DriverProfile, NewAvailability,
};

/// The offer form as submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferForm {
    pub name: String,
    pub contact: String,
    pub car_model: String,
    pub from_area: String,
    pub to_area: String,
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub discount_enabled: bool,
    pub discount_percentage: u8,
}

/// A validated offer, ready to write.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ValidOffer {
    name: String,
    contact: String,
    car_model: String,
    entry: NewAvailability,
    discount: Discount,
}

impl OfferForm {
    fn validate(&self, driver: &DriverId) -> Result<ValidOffer, DomainError> {
        let probe = DriverProfile::new(driver.clone(), &self.name, &self.contact, &self.car_model);
        probe.validate()?;
        let entry = NewAvailability::parse(
            driver.clone(),
            &self.from_area,
            &self.to_area,
            self.date,
            &self.start_time,
            &self.end_time,
        )?;
        let discount = Discount::new(self.discount_enabled, self.discount_percentage)?;

        Ok(ValidOffer {
            name: self.name.trim().to_string(),
            contact: self.contact.trim().to_string(),
            car_model: self.car_model.trim().to_string(),
            entry,
            discount,
        })
    }
}

/// What was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedOffer {
    pub driver: Driver,
    pub availability: Availability,
    pub discount: Discount,
}

/// The write that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferStep {
    LoadDriver,
    SaveDriver,
    AddAvailability,
    SaveDiscount,
}

impl fmt::Display for OfferStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OfferStep::LoadDriver => "load driver",
            OfferStep::SaveDriver => "save driver profile",
            OfferStep::AddAvailability => "add availability",
            OfferStep::SaveDiscount => "save discount",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OfferError {
    /// Rejected before anything was written
    #[error(transparent)]
    Invalid(#[from] DomainError),

    /// A step failed and every completed step was undone
    #[error("could not {step}: {source}")]
    Failed {
        step: OfferStep,
        #[source]
        source: BackendError,
    },

    /// A step failed and some completed steps could not be undone
    #[error("could not {step}: {source} (rollback incomplete: {})", .unreverted.join("; "))]
    PartiallyCompensated {
        step: OfferStep,
        #[source]
        source: BackendError,
        unreverted: Vec<String>,
    },
}

impl OfferError {
    /// The backend error behind a failed step, if any.
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            OfferError::Invalid(_) => None,
            OfferError::Failed { source, .. } | OfferError::PartiallyCompensated { source, .. } => {
                Some(source)
            }
        }
    }
}

/// How to undo a completed step.
#[derive(Debug)]
enum Compensation {
    DeleteDriver(DriverId),
    RestoreDriver(DriverProfile),
    DeleteAvailability(String),
}

impl Compensation {
    async fn run<B: Backend>(&self, backend: &B, session: &Session) -> Result<(), BackendError> {
        match self {
            Compensation::DeleteDriver(id) => backend.delete_driver(session, id).await,
            Compensation::RestoreDriver(profile) => backend.upsert_driver(session, profile).await.map(|_| ()),
            Compensation::DeleteAvailability(id) => backend.delete_availability(session, id).await,
        }
    }
}

impl fmt::Display for Compensation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compensation::DeleteDriver(id) => write!(f, "delete driver {id}"),
            Compensation::RestoreDriver(profile) => write!(f, "restore driver {}", profile.id),
            Compensation::DeleteAvailability(id) => write!(f, "delete availability {id}"),
        }
    }
}

/// Undo completed steps, newest first.
async fn roll_back<B: Backend>(
    backend: &B,
    session: &Session,
    completed: Vec<Compensation>,
    step: OfferStep,
    source: BackendError,
) -> OfferError {
    tracing::warn!(%step, error = %source, undo = completed.len(), "offer failed, rolling back");

    let mut unreverted = Vec::new();
    for compensation in completed.into_iter().rev() {
        if let Err(e) = compensation.run(backend, session).await {
            tracing::error!(error = %e, action = %compensation, "rollback step failed");
            unreverted.push(format!("{compensation}: {e}"));
        }
    }

    if unreverted.is_empty() {
        OfferError::Failed { step, source }
    } else {
        OfferError::PartiallyCompensated {
            step,
            source,
            unreverted,
        }
    }
}

/// Write an offer for the signed-in driver.
///
/// New drivers start with no rides offered and no subscription; existing
/// drivers keep their counters and flags and have their details updated.
pub async fn publish_offer<B: Backend>(
    backend: &B,
    session: &Session,
    form: &OfferForm,
) -> Result<PublishedOffer, OfferError> {
    let driver_id = session.user_id.clone();
    let offer = form.validate(&driver_id)?;

    let previous = backend
        .fetch_driver(&driver_id)
        .await
        .map_err(|source| OfferError::Failed {
            step: OfferStep::LoadDriver,
            source,
        })?;

    let mut completed = Vec::new();

    let profile = match &previous {
        Some(existing) => DriverProfile {
            name: offer.name.clone(),
            contact: offer.contact.clone(),
            car_model: offer.car_model.clone(),
            ..existing.profile()
        },
        None => DriverProfile::new(driver_id.clone(), &offer.name, &offer.contact, &offer.car_model),
    };
    let driver = match backend.upsert_driver(session, &profile).await {
        Ok(driver) => driver,
        Err(e) => return Err(roll_back(backend, session, completed, OfferStep::SaveDriver, e).await),
    };
    completed.push(match &previous {
        Some(existing) => Compensation::RestoreDriver(existing.profile()),
        None => Compensation::DeleteDriver(driver_id.clone()),
    });

    let availability = match backend.insert_availability(session, &offer.entry).await {
        Ok(entry) => entry,
        Err(e) => return Err(roll_back(backend, session, completed, OfferStep::AddAvailability, e).await),
    };
    completed.push(Compensation::DeleteAvailability(availability.id.clone()));

    if let Err(e) = backend.upsert_discount(session, &driver_id, &offer.discount).await {
        return Err(roll_back(backend, session, completed, OfferStep::SaveDiscount, e).await);
    }

    tracing::info!(
        driver = %driver_id,
        availability = %availability.id,
        new_driver = previous.is_none(),
        "offer published"
    );
    Ok(PublishedOffer {
        driver,
        availability,
        discount: offer.discount,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::UserRole;
    use crate::backend::{DriverFilter, MockBackend, SignUp};

    fn form() -> OfferForm {
        OfferForm {
            name: "Asha".to_string(),
            contact: "+1555".to_string(),
            car_model: "Civic".to_string(),
            from_area: "Downtown".to_string(),
            to_area: "Airport".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
            start_time: "09:00".to_string(),
            end_time: "09:30".to_string(),
            discount_enabled: true,
            discount_percentage: 10,
        }
    }

    async fn signed_in() -> (MockBackend, Session) {
        let backend = MockBackend::from_parts(vec![], vec![]);
        let SignUp::SignedIn(session) = backend
            .sign_up("asha@example.com", "pw", UserRole::Driver)
            .await
            .unwrap()
        else {
            panic!("mock sign-up signs in immediately");
        };
        (backend, session)
    }

    /// A driver who has been around for a while.
    async fn seasoned(backend: &MockBackend, session: &Session) {
        let profile = DriverProfile {
            rides_offered: 12,
            is_subscribed: true,
            ..DriverProfile::new(session.user_id.clone(), "Asha Old", "+1000", "Beetle")
        };
        backend.upsert_driver(session, &profile).await.unwrap();
    }

    #[tokio::test]
    async fn new_driver_offer() {
        let (backend, session) = signed_in().await;
        let published = publish_offer(&backend, &session, &form()).await.unwrap();

        assert_eq!(published.driver.rides_offered, 0);
        assert!(!published.driver.is_subscribed);
        assert_eq!(published.discount.active_percentage(), Some(10));

        let stored = backend.fetch_driver(&session.user_id).await.unwrap().unwrap();
        assert_eq!(stored.availability.len(), 1);
        assert_eq!(stored.availability[0].id, published.availability.id);
        assert_eq!(stored.discount_percentage(), Some(10));
    }

    #[tokio::test]
    async fn existing_driver_keeps_counters() {
        let (backend, session) = signed_in().await;
        seasoned(&backend, &session).await;

        let published = publish_offer(&backend, &session, &form()).await.unwrap();
        assert_eq!(published.driver.name, "Asha");
        assert_eq!(published.driver.rides_offered, 12);
        assert!(published.driver.is_subscribed);
    }

    #[tokio::test]
    async fn invalid_form_writes_nothing() {
        let (backend, session) = signed_in().await;
        let bad = OfferForm {
            start_time: "10:00".to_string(),
            end_time: "09:00".to_string(),
            ..form()
        };
        let err = publish_offer(&backend, &session, &bad).await.unwrap_err();
        assert!(matches!(err, OfferError::Invalid(DomainError::EndBeforeStart { .. })));

        let bad = OfferForm {
            discount_percentage: 150,
            ..form()
        };
        assert!(matches!(
            publish_offer(&backend, &session, &bad).await,
            Err(OfferError::Invalid(DomainError::InvalidDiscount(150)))
        ));
        assert!(backend.fetch_drivers(&DriverFilter::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_availability_removes_new_driver() {
        let (backend, session) = signed_in().await;
        backend.fail_next("insert_availability");

        let err = publish_offer(&backend, &session, &form()).await.unwrap_err();
        assert!(matches!(
            err,
            OfferError::Failed {
                step: OfferStep::AddAvailability,
                ..
            }
        ));
        assert!(backend.fetch_driver(&session.user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_discount_restores_existing_driver() {
        let (backend, session) = signed_in().await;
        seasoned(&backend, &session).await;
        backend.fail_next("upsert_discount");

        let err = publish_offer(&backend, &session, &form()).await.unwrap_err();
        assert!(matches!(err, OfferError::Failed { step: OfferStep::SaveDiscount, .. }));

        let stored = backend.fetch_driver(&session.user_id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Asha Old");
        assert_eq!(stored.car_model, "Beetle");
        assert!(stored.availability.is_empty());
        assert!(stored.discount.is_none());
    }

    #[tokio::test]
    async fn incomplete_rollback_is_reported() {
        let (backend, session) = signed_in().await;
        backend.fail_next("upsert_discount");
        backend.fail_next("delete_availability");

        let err = publish_offer(&backend, &session, &form()).await.unwrap_err();
        match &err {
            OfferError::PartiallyCompensated { step, unreverted, .. } => {
                assert_eq!(*step, OfferStep::SaveDiscount);
                assert_eq!(unreverted.len(), 1);
                assert!(unreverted[0].starts_with("delete availability"));
            }
            other => panic!("expected PartiallyCompensated, got {other:?}"),
        }
        assert!(err.to_string().contains("rollback incomplete"));
        // The driver row was still removed.
        assert!(backend.fetch_driver(&session.user_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn load_failure_writes_nothing() {
        let (backend, session) = signed_in().await;
        backend.fail_next("fetch_driver");
        let err = publish_offer(&backend, &session, &form()).await.unwrap_err();
        assert!(matches!(err, OfferError::Failed { step: OfferStep::LoadDriver, .. }));
        assert!(err.backend_error().is_some());
        assert!(backend.drivers().await.is_empty());
    }
}
