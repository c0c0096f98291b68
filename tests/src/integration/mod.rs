//! # Integration Scenarios
//!
//! Every scenario runs the full layered stack
//! (protocol → serialization → transport broker) with each service on its
//! own connection to one shared `LocalNetwork`.

#[cfg(test)]
mod fixtures;

#[cfg(test)]
mod errors;
#[cfg(test)]
mod gateway;
#[cfg(test)]
mod notifications;
#[cfg(test)]
mod requests;
