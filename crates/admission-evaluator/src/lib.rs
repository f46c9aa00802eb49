pub extern crate k8s_openapi;

pub mod access_control;
pub mod admission_request;
pub mod admission_response;
pub mod cache;
pub mod config;
pub mod config_validation;
pub mod constants;
pub mod errors;
pub mod mutation;
pub mod namespace_filter;
pub mod patch;
pub mod regex_list;
pub mod user_info;
pub mod workload;

#[cfg(test)]
mod test_utils;
