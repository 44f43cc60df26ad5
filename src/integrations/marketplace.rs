//! Marketplace lookups for advertisements and offers

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

/// The parts of an advertisement the engine needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advertisement {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub price: Decimal,
}

/// The parts of an offer the engine needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub advertisement_id: Uuid,
    pub offered_price: Decimal,
}

#[async_trait]
pub trait AdvertisementService: Send + Sync {
    async fn get_advertisement(&self, id: Uuid) -> ServiceResult<Option<Advertisement>>;
}

#[async_trait]
pub trait OfferService: Send + Sync {
    async fn get_offer(&self, id: Uuid) -> ServiceResult<Option<Offer>>;
}

/// REST client for the marketplace API
#[derive(Clone)]
pub struct MarketplaceClient {
    http: Client,
    base_url: String,
}

impl MarketplaceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(&self, path: &str) -> ServiceResult<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.http.get(&url).send().await.map_err(|e| {
            tracing::error!(url = %url, "Marketplace request failed: {}", e);
            ServiceError::Internal(format!("Marketplace unavailable: {}", e))
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let body = response.json::<T>().await.map_err(|e| {
                    ServiceError::Internal(format!("Invalid marketplace response: {}", e))
                })?;
                Ok(Some(body))
            }
            status => Err(ServiceError::Internal(format!(
                "Marketplace returned {} for {}",
                status, path
            ))),
        }
    }
}

#[async_trait]
impl AdvertisementService for MarketplaceClient {
    async fn get_advertisement(&self, id: Uuid) -> ServiceResult<Option<Advertisement>> {
        self.fetch(&format!("/advertisements/{}", id)).await
    }
}

#[async_trait]
impl OfferService for MarketplaceClient {
    async fn get_offer(&self, id: Uuid) -> ServiceResult<Option<Offer>> {
        self.fetch(&format!("/offers/{}", id)).await
    }
}
