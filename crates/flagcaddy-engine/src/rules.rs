//! Local rules: cheap, stateless advice derived from a single event.
//!
//! Every rule in [`BUILTIN_RULES`] is evaluated for every event, in declared
//! order, and every rule that matches produces its own recommendation. There
//! is no "first match wins": [`evaluate_all`] never stops early.

use flagcaddy_types::FactKind;

use crate::facts::{categorize_command, ExtractedFact};

/// What a rule sees: one event and the facts extracted from it.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub command: &'a str,
    pub output: &'a str,
    pub facts: &'a [ExtractedFact],
    pub novelty: f64,
}

impl<'a> RuleContext<'a> {
    fn values(&self, kind: FactKind) -> impl Iterator<Item = &'a str> + 'a {
        let facts: &'a [ExtractedFact] = self.facts;
        facts
            .iter()
            .filter(move |f| f.kind == kind)
            .map(|f| f.value.as_str())
    }

    fn has(&self, kind: FactKind) -> bool {
        self.values(kind).next().is_some()
    }

    /// `(port, name)` pairs of the `port/proto/name` service facts.
    fn services(&self) -> impl Iterator<Item = (u16, &'a str)> + 'a {
        self.values(FactKind::Service).filter_map(|value| {
            let mut parts = value.splitn(3, '/');
            let port = parts.next()?.parse().ok()?;
            let _proto = parts.next()?;
            Some((port, parts.next().unwrap_or("")))
        })
    }

    fn ports_matching(&self, ports: &[u16], name_hints: &[&str]) -> Vec<u16> {
        let mut found: Vec<u16> = self
            .services()
            .filter(|(port, name)| {
                ports.contains(port) || name_hints.iter().any(|hint| name.contains(hint))
            })
            .map(|(port, _)| port)
            .collect();
        found.dedup();
        found
    }
}

/// A recommendation produced by a matching rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleHit {
    pub rule: &'static str,
    pub title: &'static str,
    pub body: String,
}

/// A named predicate that may produce advice.
pub struct Rule {
    pub name: &'static str,
    pub title: &'static str,
    body: fn(&RuleContext<'_>) -> Option<String>,
}

impl Rule {
    pub fn evaluate(&self, ctx: &RuleContext<'_>) -> Option<RuleHit> {
        (self.body)(ctx).map(|body| RuleHit {
            rule: self.name,
            title: self.title,
            body,
        })
    }
}

impl std::fmt::Debug for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("title", &self.title)
            .finish()
    }
}

pub const BUILTIN_RULES: &[Rule] = &[
    Rule {
        name: "http-surface",
        title: "Enumerate HTTP surface",
        body: http_surface,
    },
    Rule {
        name: "smb-shares",
        title: "Enumerate SMB shares",
        body: smb_shares,
    },
    Rule {
        name: "ftp-anonymous",
        title: "Check FTP anonymous access",
        body: ftp_anonymous,
    },
    Rule {
        name: "credential-reuse",
        title: "Try discovered credentials",
        body: credential_reuse,
    },
    Rule {
        name: "flag-captured",
        title: "Record captured flag",
        body: flag_captured,
    },
    Rule {
        name: "sqli-confirmed",
        title: "Exploit confirmed SQL injection",
        body: sqli_confirmed,
    },
    Rule {
        name: "host-without-services",
        title: "Collect service inventory",
        body: host_without_services,
    },
];

/// Every matching built-in rule, in declared order.
pub fn evaluate_all(ctx: &RuleContext<'_>) -> Vec<RuleHit> {
    evaluate_rules(BUILTIN_RULES, ctx)
}

pub fn evaluate_rules(rules: &[Rule], ctx: &RuleContext<'_>) -> Vec<RuleHit> {
    rules.iter().filter_map(|rule| rule.evaluate(ctx)).collect()
}

fn port_list(ports: &[u16]) -> String {
    ports
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn http_surface(ctx: &RuleContext<'_>) -> Option<String> {
    let ports = ctx.ports_matching(&[80, 443, 8000, 8080, 8443], &["http"]);
    if ports.is_empty() {
        return None;
    }
    Some(format!(
        "Web service on port(s) {}. Fingerprint it with whatweb, browse it and read the \
         page source, then brute-force content with gobuster or ffuf and check for \
         virtual hosts.",
        port_list(&ports)
    ))
}

fn smb_shares(ctx: &RuleContext<'_>) -> Option<String> {
    let ports = ctx.ports_matching(&[139, 445], &["microsoft-ds", "netbios", "smb"]);
    if ports.is_empty() {
        return None;
    }
    Some(format!(
        "SMB exposed on port(s) {}. List shares with `smbclient -L //<host> -N` or \
         `smbmap -H <host>`, and try a null session with enum4linux.",
        port_list(&ports)
    ))
}

fn ftp_anonymous(ctx: &RuleContext<'_>) -> Option<String> {
    let ports = ctx.ports_matching(&[21], &["ftp"]);
    let anonymous = ctx.output.contains("Anonymous FTP login allowed");
    if ports.is_empty() && !anonymous {
        return None;
    }
    let mut body = String::from(
        "FTP is reachable. Log in as `anonymous` with an empty password, list hidden \
         files, and check whether the directory is writable.",
    );
    if anonymous {
        body.push_str(" The scan already reports anonymous login as allowed.");
    }
    Some(body)
}

fn credential_reuse(ctx: &RuleContext<'_>) -> Option<String> {
    let creds: Vec<&str> = ctx.values(FactKind::Credential).collect();
    if creds.is_empty() {
        return None;
    }
    Some(format!(
        "Found credential material: {}. Try it against every authenticated service \
         (SSH, SMB, web logins, databases) and check for password reuse across users.",
        creds.join(", ")
    ))
}

fn flag_captured(ctx: &RuleContext<'_>) -> Option<String> {
    let flags: Vec<&str> = ctx.values(FactKind::Flag).collect();
    if flags.is_empty() {
        return None;
    }
    Some(format!(
        "Captured {}. Submit it and write down the path that led here before moving on.",
        flags.join(", ")
    ))
}

fn sqli_confirmed(ctx: &RuleContext<'_>) -> Option<String> {
    if !ctx
        .values(FactKind::Vulnerability)
        .any(|v| v == "sql_injection")
    {
        return None;
    }
    Some(
        "sqlmap confirmed an injectable parameter. Enumerate databases with `--dbs`, \
         dump credential tables, and check for file read or `--os-shell`."
            .to_string(),
    )
}

fn host_without_services(ctx: &RuleContext<'_>) -> Option<String> {
    if categorize_command(ctx.command) != "port_scan"
        || !ctx.has(FactKind::Host)
        || ctx.has(FactKind::Service)
    {
        return None;
    }
    Some(
        "The scan found the host but no open ports. Rerun with `-Pn -p-` to cover every \
         TCP port, and try a top-ports UDP scan."
            .to_string(),
    )
}
