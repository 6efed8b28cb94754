pub mod auth;
pub mod bind_tenant;

pub use auth::{jwt_auth_middleware, AuthUser};
pub use bind_tenant::{bind_tenant_middleware, resolve_tenant, ResolvedTenant, TenantPool, TenantSelection};
