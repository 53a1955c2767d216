//! Deterministic server selection with primary/backup failover.

use tracing::{debug, instrument, warn};
use url::Url;

use super::{
    OPERATION_DIRECT, OPERATION_SYSTEM, SERVICE,
    endpoint::{RotationPolicy, ServerConfig, ServerEndpoint, ServerRole},
};
use crate::error::{PayboxError, Result};

const PROD_SYSTEM: &[&str] = &[
    "https://tpeweb.paybox.com/cgi/MYchoix_pagepaiement.cgi",
    "https://tpeweb1.paybox.com/cgi/MYchoix_pagepaiement.cgi",
];
const PROD_DIRECT: &[&str] =
    &["https://ppps.paybox.com/PPPS.php", "https://ppps1.paybox.com/PPPS.php"];
const PREPROD_SYSTEM: &[&str] = &["https://preprod-tpeweb.paybox.com/cgi/MYchoix_pagepaiement.cgi"];
const PREPROD_DIRECT: &[&str] = &["https://preprod-ppps.paybox.com/PPPS.php"];

/// Picks the server a request is sent to.
///
/// Candidates for a `(service, operation)` pair are the endpoints dedicated to
/// that operation, or the service default list when there are none. They are
/// ranked primary first, configuration order preserved within a role. The rank
/// of an endpoint is its *slot*.
///
/// The selector holds no mutable state: the same inputs always yield the same URL.
///
/// # Examples
///
/// ```
/// use paybox_gateway::server::{RotationPolicy, ServerEndpoint, ServerRole, ServerSelector};
/// use url::Url;
///
/// # fn example() -> paybox_gateway::error::Result<()> {
/// let a = Url::parse("https://a.example.com/PPPS.php").unwrap();
/// let b = Url::parse("https://b.example.com/PPPS.php").unwrap();
///
/// let selector = ServerSelector::new(
///     vec![
///         ServerEndpoint::new("paybox", "paybox_direct", ServerRole::Primary, a.clone()),
///         ServerEndpoint::new("paybox", "paybox_direct", ServerRole::Backup, b.clone()),
///     ],
///     RotationPolicy::Cycle,
/// );
///
/// assert_eq!(selector.select("paybox", "paybox_direct")?, a);
/// assert_eq!(selector.find_from("paybox", "paybox_direct", &a, true)?, b);
/// assert_eq!(selector.find_from("paybox", "paybox_direct", &a, false)?, a);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ServerSelector {
    endpoints: Vec<ServerEndpoint>,
    rotation: RotationPolicy,
}

impl ServerSelector {
    /// Creates a selector over `endpoints`.
    #[must_use]
    pub const fn new(endpoints: Vec<ServerEndpoint>, rotation: RotationPolicy) -> Self {
        Self { endpoints, rotation }
    }

    /// Creates a selector from a validated `[servers]` section.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::ConfigError`] if the section is invalid.
    pub fn from_config(config: &ServerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config.endpoints.clone(), config.rotation))
    }

    /// Built-in Paybox servers.
    ///
    /// Production has a primary and a backup for both Paybox System and Paybox
    /// Direct; pre-production (`test = true`) has a single server for each.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::ConfigError`] if a built-in URL fails to parse.
    pub fn paybox_defaults(test: bool) -> Result<Self> {
        let (system, direct) =
            if test { (PREPROD_SYSTEM, PREPROD_DIRECT) } else { (PROD_SYSTEM, PROD_DIRECT) };

        let mut endpoints = Vec::with_capacity(system.len() + direct.len());
        for (operation, urls) in [(OPERATION_SYSTEM, system), (OPERATION_DIRECT, direct)] {
            for (rank, url) in urls.iter().enumerate() {
                let url = Url::parse(url).map_err(|e| {
                    PayboxError::ConfigError(format!("invalid built-in URL '{url}': {e}"))
                })?;
                let role = if rank == 0 { ServerRole::Primary } else { ServerRole::Backup };
                endpoints.push(ServerEndpoint::new(SERVICE, operation, role, url));
            }
        }

        Ok(Self::new(endpoints, RotationPolicy::default()))
    }

    /// Rotation policy applied by [`find_from`](Self::find_from).
    #[must_use]
    pub const fn rotation(&self) -> RotationPolicy {
        self.rotation
    }

    /// All configured endpoints.
    #[must_use]
    pub fn endpoints(&self) -> &[ServerEndpoint] {
        &self.endpoints
    }

    /// Ranked candidates for `(service, operation)`, falling back to the service
    /// default list.
    #[must_use]
    pub fn candidates(&self, service: &str, operation: &str) -> Vec<&ServerEndpoint> {
        let dedicated = self.ranked(service, Some(operation));
        if dedicated.is_empty() { self.ranked(service, None) } else { dedicated }
    }

    /// Returns the first candidate for `(service, operation)`.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::NoServerConfigured`] when neither the operation nor
    /// the service default list has an endpoint.
    #[instrument(skip(self))]
    pub fn select(&self, service: &str, operation: &str) -> Result<Url> {
        let candidates = self.non_empty_candidates(service, operation)?;
        let url = candidates[0].url.clone();
        debug!(%url, "selected server");
        Ok(url)
    }

    /// Resolves a server relative to `previous`.
    ///
    /// The slot of `previous` is looked up among the candidates, then among the
    /// other lists of the same service, so an authorization server maps to the
    /// direct server of the same rank. Matching is by exact URL, then by host
    /// and port.
    ///
    /// - `other = false`: the candidate in the same slot, clamped to the last
    ///   candidate; an unknown `previous` yields the primary.
    /// - `other = true`: the next candidate per the [`RotationPolicy`], skipping
    ///   candidates equal to `previous`. With a single candidate it is returned
    ///   anyway and a warning is logged.
    ///
    /// # Errors
    ///
    /// Returns [`PayboxError::NoServerConfigured`] when there is no candidate.
    #[instrument(skip(self, previous), fields(previous = %previous))]
    pub fn find_from(
        &self,
        service: &str,
        operation: &str,
        previous: &Url,
        other: bool,
    ) -> Result<Url> {
        let candidates = self.non_empty_candidates(service, operation)?;
        let last = candidates.len() - 1;

        let Some(slot) = self.slot_of(service, &candidates, previous) else {
            debug!("previous server unknown, using primary");
            return Ok(candidates[0].url.clone());
        };
        let slot = slot.min(last);

        if !other {
            debug!(slot, "same slot");
            return Ok(candidates[slot].url.clone());
        }

        let start = match self.rotation {
            RotationPolicy::Cycle => (slot + 1) % candidates.len(),
            RotationPolicy::PrimaryBackup => match candidates[slot].role {
                ServerRole::Primary => candidates
                    .iter()
                    .position(|c| c.role == ServerRole::Backup)
                    .unwrap_or((slot + 1) % candidates.len()),
                ServerRole::Backup => 0,
            },
        };

        let next = (0..candidates.len())
            .map(|offset| (start + offset) % candidates.len())
            .find(|&i| candidates[i].url != *previous);

        match next {
            Some(i) => {
                debug!(slot = i, url = %candidates[i].url, "rotated to another server");
                Ok(candidates[i].url.clone())
            }
            None => {
                warn!(
                    url = %candidates[start].url,
                    "no alternative server configured, reusing the same one"
                );
                Ok(candidates[start].url.clone())
            }
        }
    }

    fn ranked(&self, service: &str, operation: Option<&str>) -> Vec<&ServerEndpoint> {
        let serving = || self.endpoints.iter().filter(move |e| e.serves(service, operation));
        serving()
            .filter(|e| e.role == ServerRole::Primary)
            .chain(serving().filter(|e| e.role == ServerRole::Backup))
            .collect()
    }

    fn non_empty_candidates(&self, service: &str, operation: &str) -> Result<Vec<&ServerEndpoint>> {
        let candidates = self.candidates(service, operation);
        if candidates.is_empty() {
            return Err(PayboxError::NoServerConfigured {
                service: service.to_owned(),
                operation: operation.to_owned(),
            });
        }
        Ok(candidates)
    }

    /// Slot of `previous` in `candidates`, else in another list of `service`.
    fn slot_of(
        &self,
        service: &str,
        candidates: &[&ServerEndpoint],
        previous: &Url,
    ) -> Option<usize> {
        if let Some(slot) = position(candidates, previous) {
            return Some(slot);
        }

        let mut operations: Vec<Option<&str>> = Vec::new();
        for endpoint in self.endpoints.iter().filter(|e| e.service == service) {
            let operation = endpoint.operation.as_deref();
            if !operations.contains(&operation) {
                operations.push(operation);
            }
        }

        operations
            .into_iter()
            .map(|operation| self.ranked(service, operation))
            .find_map(|list| position(&list, previous))
    }
}

/// Exact URL match first, then same host and port.
fn position(list: &[&ServerEndpoint], url: &Url) -> Option<usize> {
    list.iter().position(|e| e.url == *url).or_else(|| {
        list.iter().position(|e| {
            e.url.host_str().is_some()
                && e.url.host_str() == url.host_str()
                && e.url.port_or_known_default() == url.port_or_known_default()
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn direct(role: ServerRole, u: &str) -> ServerEndpoint {
        ServerEndpoint::new(SERVICE, OPERATION_DIRECT, role, url(u))
    }

    fn system(role: ServerRole, u: &str) -> ServerEndpoint {
        ServerEndpoint::new(SERVICE, OPERATION_SYSTEM, role, url(u))
    }

    fn two_servers(rotation: RotationPolicy) -> ServerSelector {
        ServerSelector::new(
            vec![
                direct(ServerRole::Primary, "https://a.example.com/PPPS.php"),
                direct(ServerRole::Backup, "https://b.example.com/PPPS.php"),
            ],
            rotation,
        )
    }

    #[test]
    fn test_select_returns_primary() {
        let selector = two_servers(RotationPolicy::Cycle);
        assert_eq!(
            selector.select(SERVICE, OPERATION_DIRECT).unwrap(),
            url("https://a.example.com/PPPS.php")
        );
    }

    #[test]
    fn test_select_ranks_primary_before_backup() {
        let selector = ServerSelector::new(
            vec![
                direct(ServerRole::Backup, "https://b.example.com/PPPS.php"),
                direct(ServerRole::Primary, "https://a.example.com/PPPS.php"),
            ],
            RotationPolicy::Cycle,
        );
        assert_eq!(
            selector.select(SERVICE, OPERATION_DIRECT).unwrap(),
            url("https://a.example.com/PPPS.php")
        );
    }

    #[test]
    fn test_find_from_other_moves_to_backup() {
        let selector = two_servers(RotationPolicy::Cycle);
        let next = selector
            .find_from(SERVICE, OPERATION_DIRECT, &url("https://a.example.com/PPPS.php"), true)
            .unwrap();
        assert_eq!(next, url("https://b.example.com/PPPS.php"));
    }

    #[test]
    fn test_find_from_same_slot() {
        let selector = two_servers(RotationPolicy::Cycle);
        let same = selector
            .find_from(SERVICE, OPERATION_DIRECT, &url("https://a.example.com/PPPS.php"), false)
            .unwrap();
        assert_eq!(same, url("https://a.example.com/PPPS.php"));
    }

    #[test]
    fn test_find_from_cycle_wraps() {
        let selector = two_servers(RotationPolicy::Cycle);
        let next = selector
            .find_from(SERVICE, OPERATION_DIRECT, &url("https://b.example.com/PPPS.php"), true)
            .unwrap();
        assert_eq!(next, url("https://a.example.com/PPPS.php"));
    }

    #[test]
    fn test_primary_backup_returns_to_primary() {
        let selector = ServerSelector::new(
            vec![
                direct(ServerRole::Primary, "https://a.example.com/PPPS.php"),
                direct(ServerRole::Backup, "https://b.example.com/PPPS.php"),
                direct(ServerRole::Backup, "https://c.example.com/PPPS.php"),
            ],
            RotationPolicy::PrimaryBackup,
        );

        let from_b = selector
            .find_from(SERVICE, OPERATION_DIRECT, &url("https://b.example.com/PPPS.php"), true)
            .unwrap();
        assert_eq!(from_b, url("https://a.example.com/PPPS.php"));

        let from_c = selector
            .find_from(SERVICE, OPERATION_DIRECT, &url("https://c.example.com/PPPS.php"), true)
            .unwrap();
        assert_eq!(from_c, url("https://a.example.com/PPPS.php"));

        let from_a = selector
            .find_from(SERVICE, OPERATION_DIRECT, &url("https://a.example.com/PPPS.php"), true)
            .unwrap();
        assert_eq!(from_a, url("https://b.example.com/PPPS.php"));
    }

    #[test]
    fn test_cycle_visits_every_server() {
        let selector = ServerSelector::new(
            vec![
                direct(ServerRole::Primary, "https://a.example.com/PPPS.php"),
                direct(ServerRole::Backup, "https://b.example.com/PPPS.php"),
                direct(ServerRole::Backup, "https://c.example.com/PPPS.php"),
            ],
            RotationPolicy::Cycle,
        );

        let mut current = selector.select(SERVICE, OPERATION_DIRECT).unwrap();
        let mut visited = vec![current.host_str().unwrap().to_owned()];
        for _ in 0..3 {
            current = selector.find_from(SERVICE, OPERATION_DIRECT, &current, true).unwrap();
            visited.push(current.host_str().unwrap().to_owned());
        }

        assert_eq!(visited, ["a.example.com", "b.example.com", "c.example.com", "a.example.com"]);
    }

    #[test]
    fn test_single_candidate_is_reused() {
        let selector = ServerSelector::new(
            vec![direct(ServerRole::Primary, "https://a.example.com/PPPS.php")],
            RotationPolicy::Cycle,
        );
        let a = url("https://a.example.com/PPPS.php");
        assert_eq!(selector.find_from(SERVICE, OPERATION_DIRECT, &a, true).unwrap(), a);
    }

    #[test]
    fn test_unknown_previous_yields_primary() {
        let selector = two_servers(RotationPolicy::Cycle);
        let unknown = url("https://elsewhere.example.com/");
        for other in [false, true] {
            let result = selector.find_from(SERVICE, OPERATION_DIRECT, &unknown, other).unwrap();
            assert_eq!(result, url("https://a.example.com/PPPS.php"));
        }
    }

    #[test]
    fn test_match_by_host_when_path_differs() {
        let selector = two_servers(RotationPolicy::Cycle);
        let previous = url("https://b.example.com/other/path?x=1");
        let same = selector.find_from(SERVICE, OPERATION_DIRECT, &previous, false).unwrap();
        assert_eq!(same, url("https://b.example.com/PPPS.php"));
    }

    #[test]
    fn test_authorization_server_maps_to_direct_slot() {
        let selector = ServerSelector::paybox_defaults(false).unwrap();
        let authorization = url("https://tpeweb1.paybox.com/cgi/MYchoix_pagepaiement.cgi");

        let same = selector.find_from(SERVICE, OPERATION_DIRECT, &authorization, false).unwrap();
        assert_eq!(same, url("https://ppps1.paybox.com/PPPS.php"));

        let other = selector.find_from(SERVICE, OPERATION_DIRECT, &authorization, true).unwrap();
        assert_eq!(other, url("https://ppps.paybox.com/PPPS.php"));
    }

    #[test]
    fn test_slot_clamped_to_last_candidate() {
        let selector = ServerSelector::new(
            vec![
                system(ServerRole::Primary, "https://s0.example.com/"),
                system(ServerRole::Backup, "https://s1.example.com/"),
                system(ServerRole::Backup, "https://s2.example.com/"),
                direct(ServerRole::Primary, "https://d0.example.com/PPPS.php"),
            ],
            RotationPolicy::Cycle,
        );

        let same = selector
            .find_from(SERVICE, OPERATION_DIRECT, &url("https://s2.example.com/"), false)
            .unwrap();
        assert_eq!(same, url("https://d0.example.com/PPPS.php"));
    }

    #[test]
    fn test_service_default_list_fallback() {
        let selector = ServerSelector::new(
            vec![ServerEndpoint::service_default(
                SERVICE,
                ServerRole::Primary,
                url("https://all.example.com/"),
            )],
            RotationPolicy::Cycle,
        );
        assert_eq!(
            selector.select(SERVICE, OPERATION_DIRECT).unwrap(),
            url("https://all.example.com/")
        );
    }

    #[test]
    fn test_no_server_configured() {
        let selector = ServerSelector::new(Vec::new(), RotationPolicy::Cycle);
        let result = selector.select(SERVICE, OPERATION_DIRECT);
        assert!(matches!(result, Err(PayboxError::NoServerConfigured { .. })));

        let result =
            selector.find_from(SERVICE, OPERATION_DIRECT, &url("https://a.example.com/"), true);
        assert!(matches!(result, Err(PayboxError::NoServerConfigured { .. })));
    }

    #[test]
    fn test_other_service_not_used() {
        let selector = ServerSelector::new(
            vec![ServerEndpoint::service_default(
                "other",
                ServerRole::Primary,
                url("https://x.example.com/"),
            )],
            RotationPolicy::Cycle,
        );
        assert!(selector.select(SERVICE, OPERATION_DIRECT).is_err());
    }

    #[test]
    fn test_paybox_defaults_preprod() {
        let selector = ServerSelector::paybox_defaults(true).unwrap();
        assert_eq!(
            selector.select(SERVICE, OPERATION_SYSTEM).unwrap(),
            url("https://preprod-tpeweb.paybox.com/cgi/MYchoix_pagepaiement.cgi")
        );
        assert_eq!(
            selector.select(SERVICE, OPERATION_DIRECT).unwrap(),
            url("https://preprod-ppps.paybox.com/PPPS.php")
        );
    }

    #[test]
    fn test_paybox_defaults_production() {
        let selector = ServerSelector::paybox_defaults(false).unwrap();
        assert_eq!(selector.candidates(SERVICE, OPERATION_SYSTEM).len(), 2);
        assert_eq!(selector.candidates(SERVICE, OPERATION_DIRECT).len(), 2);
        assert!(selector.endpoints().iter().all(|e| e.validate().is_ok()));
    }

    #[test]
    fn test_selection_is_deterministic() {
        let selector = two_servers(RotationPolicy::Cycle);
        let a = url("https://a.example.com/PPPS.php");
        let first = selector.find_from(SERVICE, OPERATION_DIRECT, &a, true).unwrap();
        for _ in 0..10 {
            assert_eq!(selector.find_from(SERVICE, OPERATION_DIRECT, &a, true).unwrap(), first);
        }
    }
}
