//! funnelkit: conversion funnel and A/B significance toolkit
//!
//! Joins per-step event tables into one record per user, then computes
//! funnel reach, conversion rates and a chi-square test of variant against
//! confirmation. The `cli` module renders the results in the terminal.

pub mod cli;
pub mod core;
