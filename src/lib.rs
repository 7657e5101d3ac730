// Module layout (Clean Architecture style)
// - bootstrap: configuration and startup
// - infrastructure: realtime messaging internals
// - presentation: HTTP/WS handlers and routing

pub mod bootstrap;
pub mod infrastructure;
pub mod presentation;
