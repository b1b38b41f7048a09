pub mod client;
pub mod executor;
#[cfg(any(test, feature = "test-util"))]
pub mod stub;

pub use client::{HttpClient, HttpMethod, HttpRequest, HttpResponse, ReqwestClient, RequestBody};
pub use executor::{execute_json_request, ErrorHandling, ErrorParser};
