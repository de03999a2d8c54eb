//! HTTP request handlers for the alert surface.

pub mod alerts;
