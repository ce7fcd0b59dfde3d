use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;
use crate::models::Customer;
use crate::repositories::{require, Repository};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewCustomer {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub contact_name: Option<String>,
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CustomerUpdate {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub contact_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 40))]
    pub phone: Option<String>,
    pub address: Option<String>,
}

pub struct CustomerService {
    repo: Arc<dyn Repository<Customer>>,
    // held across the email uniqueness check and the write
    write_lock: Mutex<()>,
}

impl CustomerService {
    pub fn new(repo: Arc<dyn Repository<Customer>>) -> Self {
        Self {
            repo,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn list(&self) -> Result<Vec<Customer>, ServiceError> {
        let mut customers = self.repo.list().await?;
        customers.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
        Ok(customers)
    }

    pub async fn get(&self, id: i64) -> Result<Customer, ServiceError> {
        require(self.repo.as_ref(), "Customer", id).await
    }

    #[instrument(skip(self))]
    pub async fn create(&self, input: NewCustomer) -> Result<Customer, ServiceError> {
        input.validate()?;
        let email = input.email.trim().to_lowercase();
        let _guard = self.write_lock.lock().await;
        if self
            .repo
            .list()
            .await?
            .iter()
            .any(|c| c.email.eq_ignore_ascii_case(&email))
        {
            return Err(ServiceError::Conflict(format!(
                "a customer with email {} already exists",
                email
            )));
        }

        let customer = self
            .repo
            .insert(Customer {
                id: 0,
                name: input.name.trim().to_string(),
                contact_name: input.contact_name,
                email,
                phone: input.phone,
                address: input.address,
                created_at: Utc::now(),
            })
            .await?;
        info!(customer_id = customer.id, name = %customer.name, "Customer created");
        Ok(customer)
    }

    #[instrument(skip(self))]
    pub async fn update(&self, id: i64, input: CustomerUpdate) -> Result<Customer, ServiceError> {
        input.validate()?;
        let _guard = self.write_lock.lock().await;
        let mut customer = self.get(id).await?;
        if let Some(name) = input.name {
            customer.name = name.trim().to_string();
        }
        if let Some(email) = input.email {
            let email = email.trim().to_lowercase();
            if self
                .repo
                .list()
                .await?
                .iter()
                .any(|c| c.id != id && c.email.eq_ignore_ascii_case(&email))
            {
                return Err(ServiceError::Conflict(format!(
                    "a customer with email {} already exists",
                    email
                )));
            }
            customer.email = email;
        }
        if input.contact_name.is_some() {
            customer.contact_name = input.contact_name;
        }
        if input.phone.is_some() {
            customer.phone = input.phone;
        }
        if input.address.is_some() {
            customer.address = input.address;
        }
        self.repo.update(customer).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: i64) -> Result<(), ServiceError> {
        if self.repo.delete(id).await? {
            info!(customer_id = id, "Customer deleted");
            Ok(())
        } else {
            Err(ServiceError::not_found("Customer", id))
        }
    }
}
