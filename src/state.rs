use std::sync::Arc;

use sqlx::PgPool;

use crate::access::PermissionResolver;
use crate::audit::AuditTrail;
use crate::config::{Config, IdentityBackend};
use crate::db::{AccountStore, AuditStore, MemoryStore, PgStore, RoleStore, SubscriptionSource};
use crate::identity::{HostedIdentity, IdentityProvider, LocalIdentity, MemoryIdentity};
use crate::provisioning::Provisioner;
use crate::rate_limit::LoginRateLimiter;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub config: Config,
    pub accounts: Arc<dyn AccountStore>,
    pub roles: Arc<dyn RoleStore>,
    pub subscriptions: Arc<dyn SubscriptionSource>,
    pub identity: Arc<dyn IdentityProvider>,
    pub audit: AuditTrail,
    pub resolver: PermissionResolver,
    pub provisioner: Provisioner,
    pub login_limiter: LoginRateLimiter,
}

/// The collaborators a state is assembled from.
#[derive(Clone)]
pub struct Backends {
    pub accounts: Arc<dyn AccountStore>,
    pub roles: Arc<dyn RoleStore>,
    pub audit: Arc<dyn AuditStore>,
    pub subscriptions: Arc<dyn SubscriptionSource>,
    pub identity: Arc<dyn IdentityProvider>,
}

fn identity_for(
    config: &Config,
    pool: Option<&PgPool>,
) -> Result<Arc<dyn IdentityProvider>, String> {
    Ok(match (&config.identity, pool) {
        (IdentityBackend::Hosted { url, service_key }, _) => {
            Arc::new(HostedIdentity::new(url, service_key.clone())?)
        }
        (IdentityBackend::Local, Some(pool)) => Arc::new(LocalIdentity::new(
            pool.clone(),
            config.jwt_secret.clone(),
            config.token_ttl,
        )),
        (IdentityBackend::Local, None) => Arc::new(MemoryIdentity::new(
            config.jwt_secret.clone(),
            config.token_ttl,
        )),
    })
}

impl Backends {
    pub fn postgres(pool: PgPool, config: &Config) -> Result<Self, String> {
        let identity = identity_for(config, Some(&pool))?;
        let store = Arc::new(PgStore::new(pool));
        Ok(Self {
            accounts: store.clone(),
            roles: store.clone(),
            audit: store.clone(),
            subscriptions: store,
            identity,
        })
    }

    /// Everything kept in process. Identities are in memory too unless a
    /// hosted identity service is configured.
    pub fn memory(store: Arc<MemoryStore>, config: &Config) -> Result<Self, String> {
        let identity = identity_for(config, None)?;
        Ok(Self::with_identity(store, identity))
    }

    pub fn with_identity(store: Arc<MemoryStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            accounts: store.clone(),
            roles: store.clone(),
            audit: store.clone(),
            subscriptions: store,
            identity,
        }
    }
}

impl AppState {
    pub fn new(config: Config, backends: Backends) -> SharedState {
        let resolver = PermissionResolver::new(backends.roles.clone());
        let audit = AuditTrail::new(backends.audit);
        let provisioner = Provisioner::new(
            resolver.clone(),
            backends.identity.clone(),
            backends.accounts.clone(),
            backends.roles.clone(),
            audit.clone(),
            config.provisioning_timeout,
        );

        Arc::new(AppState {
            config,
            accounts: backends.accounts,
            roles: backends.roles,
            subscriptions: backends.subscriptions,
            identity: backends.identity,
            audit,
            resolver,
            provisioner,
            login_limiter: LoginRateLimiter::default(),
        })
    }
}
