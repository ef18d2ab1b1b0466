use arc_swap::ArcSwap;
use dnsgate_domain::dns_wire::{encode_qname, parse_qname, qname_is_compressed, HEADER_LEN};
use dnsgate_domain::{DomainError, RewriteRule};
use std::sync::Arc;
use tracing::{debug, info};

/// QTYPE + QCLASS.
const QUESTION_TAIL_LEN: usize = 4;

/// Result of running a query through the rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    /// Forward the original bytes unchanged. `queried_name` is `None` when
    /// the question could not be read.
    PassThrough { queried_name: Option<String> },

    Rewritten {
        queried_name: String,
        target: String,
        query: Vec<u8>,
        /// Encoded question name exactly as the client sent it.
        original_qname: Vec<u8>,
    },
}

impl RewriteOutcome {
    pub fn queried_name(&self) -> Option<&str> {
        match self {
            Self::PassThrough { queried_name } => queried_name.as_deref(),
            Self::Rewritten { queried_name, .. } => Some(queried_name),
        }
    }

    pub fn is_rewritten(&self) -> bool {
        matches!(self, Self::Rewritten { .. })
    }
}

/// Swaps the queried name on the way out and puts it back on the way in.
///
/// The rule list is replaced wholesale on reload; readers see either the old
/// list or the new one.
pub struct RewriteEngine {
    rules: ArcSwap<Vec<RewriteRule>>,
}

impl Default for RewriteEngine {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl RewriteEngine {
    pub fn new(rules: Vec<RewriteRule>) -> Self {
        Self {
            rules: ArcSwap::from_pointee(enabled_only(rules)),
        }
    }

    pub fn reload(&self, rules: Vec<RewriteRule>) {
        let rules = enabled_only(rules);
        info!(rules = rules.len(), "Rewrite rules reloaded");
        self.rules.store(Arc::new(rules));
    }

    pub fn rule_count(&self) -> usize {
        self.rules.load().len()
    }

    /// Any parse failure yields a pass-through of the original bytes.
    pub fn apply(&self, query: &[u8]) -> RewriteOutcome {
        let queried_name = match question_name(query) {
            Ok((name, _)) => name,
            Err(e) => {
                debug!(error = %e, "Question unreadable, forwarding as-is");
                return RewriteOutcome::PassThrough { queried_name: None };
            }
        };

        let rules = self.rules.load();
        let Some(rule) = rules.iter().find(|r| r.matches(&queried_name)) else {
            return RewriteOutcome::PassThrough {
                queried_name: Some(queried_name),
            };
        };

        match splice_question(query, &rule.to_domain) {
            Ok((rewritten, original_qname)) => {
                debug!(
                    rule_id = rule.id,
                    from = %queried_name,
                    to = %rule.to_domain,
                    "Query rewritten"
                );
                RewriteOutcome::Rewritten {
                    queried_name,
                    target: rule.to_domain.clone(),
                    query: rewritten,
                    original_qname,
                }
            }
            Err(e) => {
                debug!(error = %e, rule_id = rule.id, "Rewrite skipped");
                RewriteOutcome::PassThrough {
                    queried_name: Some(queried_name),
                }
            }
        }
    }

    /// Puts `original_qname` back into the echoed question of `response`.
    /// Returns the response untouched if it cannot be read.
    pub fn restore(response: &[u8], original_qname: &[u8]) -> Vec<u8> {
        match replace_question_name(response, original_qname) {
            Ok(restored) => restored,
            Err(e) => {
                debug!(error = %e, "Response question unreadable, delivering as-is");
                response.to_vec()
            }
        }
    }
}

fn enabled_only(rules: Vec<RewriteRule>) -> Vec<RewriteRule> {
    rules.into_iter().filter(|r| r.enabled).collect()
}

/// Name and encoded length of the first question. Compressed question names
/// are refused.
fn question_name(message: &[u8]) -> Result<(String, usize), DomainError> {
    if message.len() < HEADER_LEN {
        return Err(DomainError::InvalidDnsMessage(format!(
            "{} bytes is shorter than a header",
            message.len()
        )));
    }
    if qname_is_compressed(message, HEADER_LEN)? {
        return Err(DomainError::InvalidDnsMessage(
            "compressed question name".to_string(),
        ));
    }

    let (name, len) = parse_qname(message, HEADER_LEN)?;
    if message.len() < HEADER_LEN + len + QUESTION_TAIL_LEN {
        return Err(DomainError::InvalidDnsMessage(
            "question truncated before QTYPE/QCLASS".to_string(),
        ));
    }
    Ok((name, len))
}

/// Header, new name, then everything from QTYPE onward verbatim, so an EDNS
/// OPT record in the additional section still matches ARCOUNT.
fn splice_question(query: &[u8], target: &str) -> Result<(Vec<u8>, Vec<u8>), DomainError> {
    let (_, qname_len) = question_name(query)?;
    let new_qname = encode_qname(target)?;
    let name_end = HEADER_LEN + qname_len;

    Ok((
        replace_question_name(query, &new_qname)?,
        query[HEADER_LEN..name_end].to_vec(),
    ))
}

/// Header, replacement name, then everything from QTYPE onward verbatim.
fn replace_question_name(response: &[u8], qname: &[u8]) -> Result<Vec<u8>, DomainError> {
    let (_, qname_len) = question_name(response)?;
    let name_end = HEADER_LEN + qname_len;

    let mut restored = Vec::with_capacity(response.len() - qname_len + qname.len());
    restored.extend_from_slice(&response[..HEADER_LEN]);
    restored.extend_from_slice(qname);
    restored.extend_from_slice(&response[name_end..]);
    Ok(restored)
}
