//! A storage server: a [`adapter::LocalStorage`] rooted at a local
//! directory, exposed over a data and a command skeleton (spec §4.E).

pub mod adapter;
pub mod service;
