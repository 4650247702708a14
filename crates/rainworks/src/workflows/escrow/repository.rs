use std::collections::HashMap;
use std::sync::Mutex;

use crate::workflows::registry::JobId;
use crate::workflows::store::RepositoryError;

use super::domain::{MilestoneId, Payment, PaymentId};

/// Storage abstraction for payments with their embedded milestones.
pub trait PaymentRepository: Send + Sync {
    fn insert(&self, payment: Payment) -> Result<Payment, RepositoryError>;
    fn update(&self, payment: Payment) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &PaymentId) -> Result<Option<Payment>, RepositoryError>;
    fn for_job(&self, job_id: &JobId) -> Result<Option<Payment>, RepositoryError>;
    /// Parent payment of a milestone.
    fn payment_for_milestone(
        &self,
        milestone_id: &MilestoneId,
    ) -> Result<Option<PaymentId>, RepositoryError>;
}

#[derive(Debug, Default)]
struct PaymentTables {
    payments: HashMap<PaymentId, Payment>,
    by_job: HashMap<JobId, PaymentId>,
    by_milestone: HashMap<MilestoneId, PaymentId>,
}

#[derive(Debug, Default)]
pub struct InMemoryPaymentRepository {
    tables: Mutex<PaymentTables>,
}

impl PaymentRepository for InMemoryPaymentRepository {
    fn insert(&self, payment: Payment) -> Result<Payment, RepositoryError> {
        let mut guard = self.tables.lock()?;
        if guard.payments.contains_key(&payment.id) || guard.by_job.contains_key(&payment.job_id) {
            return Err(RepositoryError::Conflict);
        }
        guard
            .by_job
            .insert(payment.job_id.clone(), payment.id.clone());
        for milestone in &payment.milestones {
            guard
                .by_milestone
                .insert(milestone.id.clone(), payment.id.clone());
        }
        guard.payments.insert(payment.id.clone(), payment.clone());
        Ok(payment)
    }

    fn update(&self, payment: Payment) -> Result<(), RepositoryError> {
        let mut guard = self.tables.lock()?;
        match guard.payments.get_mut(&payment.id) {
            Some(slot) => {
                *slot = payment;
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn fetch(&self, id: &PaymentId) -> Result<Option<Payment>, RepositoryError> {
        let guard = self.tables.lock()?;
        Ok(guard.payments.get(id).cloned())
    }

    fn for_job(&self, job_id: &JobId) -> Result<Option<Payment>, RepositoryError> {
        let guard = self.tables.lock()?;
        Ok(guard
            .by_job
            .get(job_id)
            .and_then(|id| guard.payments.get(id))
            .cloned())
    }

    fn payment_for_milestone(
        &self,
        milestone_id: &MilestoneId,
    ) -> Result<Option<PaymentId>, RepositoryError> {
        let guard = self.tables.lock()?;
        Ok(guard.by_milestone.get(milestone_id).cloned())
    }
}
