//! Route paths.

pub const POST_AUTH_LOGIN: &str = "/api/auth/login";
pub const POST_AUTH_LOGOUT: &str = "/api/auth/logout";
pub const POST_AUTH_REGISTER: &str = "/api/auth/register";
pub const GET_AUTH_ME: &str = "/api/auth/me";

pub const GET_PUBLICATIONS: &str = "/api/publications";
pub const GET_PUBLICATIONS_ID: &str = "/api/publications/{id}";
pub const POST_PUBLICATIONS_ID_ACCESS: &str = "/api/publications/{id}/access";

pub const POST_PURCHASE_CREATE: &str = "/api/purchase/create";
pub const GET_USER_PURCHASE_REQUESTS: &str = "/api/user/purchase-requests";
pub const GET_USER_DIGITAL_TOKENS: &str = "/api/user/digital-tokens";

pub const POST_ADMIN_ASSIGN_ROLE: &str = "/api/admin/assign-role";
pub const GET_ADMIN_ROLES: &str = "/api/admin/roles";
pub const POST_ADMIN_APPROVE_PURCHASE: &str = "/api/admin/approve-purchase";
pub const POST_ADMIN_REJECT_PURCHASE: &str = "/api/admin/reject-purchase";
pub const GET_ADMIN_PURCHASES: &str = "/api/admin/purchases";
pub const POST_ADMIN_GRANT_ACCESS: &str = "/api/admin/grant-access";

pub const GET_HEALTH: &str = "/api/health";
