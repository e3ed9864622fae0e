//! The public tenant serves registration and the landing pages.

use std::fmt;

use anyhow::Result;
use chrono::{Days, Utc};
use echo_core::models::{NewClient, NewDomain};
use echo_core::{Client, Directory, EchoError, SchemaName};

/// Hostnames of the public tenant: `(domain, is_primary)`.
pub const PUBLIC_DOMAINS: [(&str, bool); 2] = [("127.0.0.1", true), ("localhost", false)];

#[derive(Debug, Clone)]
pub struct PublicTenantReport {
    pub tenant: Client,
    pub tenant_created: bool,
    /// `(domain, created)` in [`PUBLIC_DOMAINS`] order.
    pub domains: Vec<(String, bool)>,
}

fn status(created: bool) -> &'static str {
    if created {
        "created"
    } else {
        "already exists"
    }
}

impl fmt::Display for PublicTenantReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Public tenant: {}", status(self.tenant_created))?;
        for (domain, created) in &self.domains {
            writeln!(f, "Domain {domain}: {}", status(*created))?;
        }
        write!(f, "Public tenant setup completed!")
    }
}

/// Create the public tenant and its canonical domains unless they exist.
pub async fn ensure_public_tenant(directory: &dyn Directory, trial_days: u64) -> Result<PublicTenantReport> {
    let paid_until = Utc::now()
        .date_naive()
        .checked_add_days(Days::new(trial_days))
        .ok_or_else(|| EchoError::general_error("tenants.trial_days is out of range").into_anyhow())?;

    let (tenant, tenant_created) = directory
        .get_or_create_client(NewClient {
            schema_name: SchemaName::public(),
            name: "Public".to_string(),
            paid_until,
            on_trial: false,
        })
        .await?;

    let mut domains = Vec::with_capacity(PUBLIC_DOMAINS.len());
    for (domain, is_primary) in PUBLIC_DOMAINS {
        let (_, created) = directory
            .get_or_create_domain(NewDomain {
                domain: domain.to_string(),
                tenant_id: tenant.id,
                is_primary,
            })
            .await?;
        domains.push((domain.to_string(), created));
    }

    if tenant_created || domains.iter().any(|(_, created)| *created) {
        tracing::info!(tenant = %tenant.id, "public tenant provisioned");
    }

    Ok(PublicTenantReport {
        tenant,
        tenant_created,
        domains,
    })
}

#[cfg(test)]
mod tests {
    use echo_core::store::MemoryStore;

    use super::*;

    #[tokio::test]
    async fn running_twice_yields_one_public_tenant() {
        let store = MemoryStore::new();

        let first = ensure_public_tenant(&store, 365).await.unwrap();
        assert!(first.tenant_created);
        assert!(!first.tenant.on_trial);
        assert_eq!(first.tenant.name, "Public");
        assert!(first.domains.iter().all(|(_, created)| *created));

        let second = ensure_public_tenant(&store, 365).await.unwrap();
        assert!(!second.tenant_created);
        assert!(second.domains.iter().all(|(_, created)| !*created));
        assert!(second.to_string().contains("Public tenant: already exists"));

        let clients = store.clients().await.unwrap();
        assert_eq!(clients.len(), 1);
        assert!(clients[0].schema_name.is_public());

        let domains = store.domains_for(first.tenant.id).await.unwrap();
        assert_eq!(domains.len(), 2);
        assert_eq!(domains[0].domain, "127.0.0.1");
        assert!(domains[0].is_primary);
        assert_eq!(domains[1].domain, "localhost");
        assert!(!domains[1].is_primary);
    }
}
