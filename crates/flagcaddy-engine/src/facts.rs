//! Fact extraction from command lines and their output.
//!
//! [`FactExtractor`] is the seam the engine consumes. [`RegexFactExtractor`]
//! recognizes what recon tooling typically prints: addresses, open ports,
//! discovered paths, confirmed injections, credentials, and CTF flags.

use std::collections::HashSet;

use regex::Regex;

use flagcaddy_types::{FactKind, FlagcaddyError};

/// One typed observation produced by an extractor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtractedFact {
    pub kind: FactKind,
    pub value: String,
}

impl ExtractedFact {
    pub fn new(kind: FactKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Turns a command and its output into typed facts.
///
/// Implementations must be deterministic and free of side effects.
pub trait FactExtractor {
    fn extract(&self, command: &str, output: &str) -> Vec<ExtractedFact>;
}

/// Programs that only wrap the real command.
const COMMAND_WRAPPERS: &[&str] = &[
    "sudo", "doas", "env", "time", "nohup", "proxychains", "proxychains4", "torify",
];

/// Programs recorded as `tool` facts when they are the command being run.
const KNOWN_TOOLS: &[&str] = &[
    "nmap", "masscan", "rustscan", "gobuster", "dirb", "dirbuster", "ffuf", "feroxbuster",
    "wfuzz", "nikto", "wpscan", "whatweb", "sqlmap", "msfconsole", "msfvenom", "searchsploit",
    "hydra", "medusa", "john", "hashcat", "crackmapexec", "netexec", "nxc", "enum4linux",
    "smbclient", "smbmap", "rpcclient", "ldapsearch", "kerbrute", "evil-winrm", "responder",
    "nc", "ncat", "netcat", "socat", "curl", "wget", "ssh", "ftp", "tcpdump",
];

/// TLDs accepted for two-label names. Other TLDs need at least three labels.
const KNOWN_TLDS: &[&str] = &[
    "com", "org", "net", "edu", "gov", "mil", "int", "io", "co", "us", "uk", "de", "fr", "jp",
    "cn", "au", "ca", "local", "localhost", "lan", "htb", "thm", "ctf", "box", "app", "dev",
    "test", "example", "invalid", "xyz", "tech", "online", "site", "website", "space", "ru",
    "br", "in", "nl", "ch", "se", "no", "dk", "fi",
];

/// Suffixes that make a dotted word a file name rather than a host.
const FILE_EXTENSIONS: &[&str] = &[
    ".txt", ".log", ".json", ".xml", ".html", ".js", ".css", ".py", ".sh", ".md", ".rst",
    ".yaml", ".yml", ".toml", ".ini", ".conf", ".cfg", ".jpg", ".png", ".gif", ".svg", ".ico",
    ".pdf", ".zip", ".tar", ".gz", ".exe", ".dll", ".so", ".dylib", ".bin", ".dat", ".db",
    ".sql", ".c", ".cpp", ".h", ".java", ".go", ".rs", ".rb", ".php", ".pl", ".egg", ".whl",
    ".pyc", ".pyo", ".class", ".jar", ".war", ".bak", ".tmp", ".swp", ".lock", ".cache",
    ".old", ".orig",
];

/// Dotted identifiers from tool configs that look like domains.
const CONFIG_KEYS: &[&str] = &[
    "user.name", "user.email", "core.editor", "credential.helper", "remote.origin",
    "branch.main", "branch.master", "init.defaultbranch", "core.autocrlf", "core.filemode",
    "merge.tool", "diff.tool", "pull.rebase", "push.default", "color.ui",
];

/// Regex-driven extractor for common recon and exploitation output.
pub struct RegexFactExtractor {
    ipv4: Regex,
    cidr: Regex,
    domain: Regex,
    open_port: Regex,
    os_details: Regex,
    web_path: Regex,
    login_password: Regex,
    password: Regex,
    flag: Regex,
}

impl RegexFactExtractor {
    pub fn new() -> Result<Self, FlagcaddyError> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                FlagcaddyError::ExtractError(format!("invalid extractor pattern {pattern:?}: {e}"))
            })
        };
        Ok(Self {
            ipv4: compile(r"\b(?:\d{1,3}\.){3}\d{1,3}\b")?,
            cidr: compile(r"\b(\d{1,3}(?:\.\d{1,3}){3})/(\d{1,2})\b")?,
            domain: compile(r"\b(?:[a-zA-Z0-9-]+\.)+[a-zA-Z]{2,}\b")?,
            open_port: compile(r"(?i)^\s*(\d{1,5})/(tcp|udp)\s+open\S*(?:[ \t]+(\S+))?")?,
            os_details: compile(r"OS details:[ \t]*(.+)")?,
            web_path: compile(r"(/\S*)\s+\(Status:\s*(\d{3})\)")?,
            login_password: compile(r"(?i)\blogin:[ \t]*(\S+)[ \t]+password:[ \t]*(\S+)")?,
            password: compile(r#"(?i)\b(?:password|passwd|pwd|pass)[ \t]*[=:][ \t]*([^\s'"]+)"#)?,
            flag: compile(r"(?i)\b(?:flag|htb|thm|ctf)\{[^}\s]{1,200}\}")?,
        })
    }

    fn hosts(&self, text: &str, facts: &mut Vec<ExtractedFact>) {
        for m in self.ipv4.find_iter(text) {
            if is_plausible_ipv4(m.as_str()) {
                facts.push(ExtractedFact::new(FactKind::Host, m.as_str()));
            }
        }
        for m in self.domain.find_iter(text) {
            if is_plausible_domain(m.as_str()) {
                facts.push(ExtractedFact::new(FactKind::Host, m.as_str().to_lowercase()));
            }
        }
    }

    fn networks(&self, text: &str, facts: &mut Vec<ExtractedFact>) {
        for caps in self.cidr.captures_iter(text) {
            let prefix_ok = caps[2].parse::<u8>().is_ok_and(|p| p <= 32);
            if prefix_ok && octets(&caps[1]).is_some() {
                facts.push(ExtractedFact::new(FactKind::Network, &caps[0]));
            }
        }
    }

    fn services(&self, output: &str, facts: &mut Vec<ExtractedFact>) {
        for line in output.lines() {
            let Some(caps) = self.open_port.captures(line) else {
                continue;
            };
            if !caps[1].parse::<u32>().is_ok_and(|port| (1..=65535).contains(&port)) {
                continue;
            }
            let name = caps.get(3).map_or("unknown", |m| m.as_str());
            let value = format!("{}/{}/{}", &caps[1], caps[2].to_lowercase(), name);
            facts.push(ExtractedFact::new(FactKind::Service, value));
        }
    }

    fn tool_specific(&self, command: &str, output: &str, facts: &mut Vec<ExtractedFact>) {
        let command_lower = command.to_lowercase();
        let output_lower = output.to_lowercase();

        if command_lower.contains("nmap") {
            if let Some(caps) = self.os_details.captures(output) {
                facts.push(ExtractedFact::new(FactKind::Os, caps[1].trim()));
            }
        }

        for caps in self.web_path.captures_iter(output) {
            facts.push(ExtractedFact::new(FactKind::WebPath, &caps[1]));
        }

        if command_lower.contains("sqlmap")
            && (output_lower.contains("is vulnerable")
                || (output_lower.contains("parameter") && output_lower.contains("injectable")))
        {
            facts.push(ExtractedFact::new(FactKind::Vulnerability, "sql_injection"));
        }

        if command_lower.contains("nikto") && output.contains("OSVDB-") {
            facts.push(ExtractedFact::new(FactKind::Vulnerability, "nikto_findings"));
        }
    }

    fn credentials(&self, output: &str, facts: &mut Vec<ExtractedFact>) {
        for line in output.lines() {
            if let Some(caps) = self.login_password.captures(line) {
                let value = format!("{}:{}", &caps[1], &caps[2]);
                facts.push(ExtractedFact::new(FactKind::Credential, value));
                continue;
            }
            for caps in self.password.captures_iter(line) {
                facts.push(ExtractedFact::new(FactKind::Credential, &caps[1]));
            }
        }
    }

    fn flags(&self, text: &str, facts: &mut Vec<ExtractedFact>) {
        for m in self.flag.find_iter(text) {
            facts.push(ExtractedFact::new(FactKind::Flag, m.as_str()));
        }
    }
}

impl FactExtractor for RegexFactExtractor {
    fn extract(&self, command: &str, output: &str) -> Vec<ExtractedFact> {
        let combined = format!("{command} {output}");
        let mut facts = Vec::new();

        self.hosts(&combined, &mut facts);
        self.networks(&combined, &mut facts);
        self.services(output, &mut facts);
        self.tool_specific(command, output, &mut facts);
        self.credentials(output, &mut facts);
        self.flags(output, &mut facts);
        if let Some(tool) = command_program(command).filter(|p| KNOWN_TOOLS.contains(p)) {
            facts.push(ExtractedFact::new(FactKind::Tool, tool));
        }

        let mut seen = HashSet::new();
        facts.retain(|fact| seen.insert(fact.clone()));
        facts
    }
}

/// The program a command line runs, skipping wrappers like `sudo` and
/// leading `VAR=value` assignments.
pub fn command_program(command: &str) -> Option<&str> {
    let mut after_wrapper = false;
    for token in command.split_whitespace() {
        if token.contains('=') && !token.starts_with('-') {
            continue;
        }
        if after_wrapper && token.starts_with('-') {
            continue;
        }
        let name = token.rsplit('/').next().unwrap_or(token);
        if COMMAND_WRAPPERS.contains(&name) {
            after_wrapper = true;
            continue;
        }
        return Some(name);
    }
    None
}

/// Coarse purpose of a command, used to label advisory prompt blocks.
pub fn categorize_command(command: &str) -> &'static str {
    const CATEGORIES: &[(&str, &[&str])] = &[
        ("port_scan", &["nmap", "masscan", "rustscan"]),
        ("web_enumeration", &["gobuster", "dirb", "dirbuster", "ffuf", "feroxbuster", "wfuzz"]),
        ("web_scan", &["nikto", "wpscan", "whatweb"]),
        ("sql_injection", &["sqlmap"]),
        ("metasploit", &["metasploit", "msfconsole", "msfvenom"]),
        ("password_attack", &["hydra", "medusa", "john", "hashcat"]),
        ("web_request", &["curl", "wget"]),
        ("network", &["nc", "netcat", "ncat", "socat"]),
        ("ssh", &["ssh", "scp", "sftp"]),
    ];

    let programs: Vec<String> = command
        .split(|c: char| c.is_whitespace() || matches!(c, '|' | ';' | '&'))
        .filter(|t| !t.is_empty())
        .map(|t| t.rsplit('/').next().unwrap_or(t).to_lowercase())
        .collect();

    CATEGORIES
        .iter()
        .find(|(_, tools)| programs.iter().any(|p| tools.contains(&p.as_str())))
        .map_or("general", |(category, _)| *category)
}

fn octets(ip: &str) -> Option<[u8; 4]> {
    let mut out = [0u8; 4];
    let mut parts = ip.split('.');
    for slot in &mut out {
        *slot = parts.next()?.parse().ok()?;
    }
    parts.next().is_none().then_some(out)
}

/// Valid octets, and not a version string such as `1.2.3.4`.
fn is_plausible_ipv4(ip: &str) -> bool {
    octets(ip).is_some_and(|o| o.iter().any(|&n| n >= 10))
}

fn is_plausible_domain(domain: &str) -> bool {
    let lower = domain.to_lowercase();
    if !(4..=253).contains(&lower.len()) {
        return false;
    }
    if FILE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return false;
    }
    if CONFIG_KEYS.contains(&lower.as_str())
        || ["config.", "settings.", "package."]
            .iter()
            .any(|p| lower.contains(p))
    {
        return false;
    }

    let labels: Vec<&str> = lower.split('.').collect();
    let Some((tld, rest)) = labels.split_last() else {
        return false;
    };
    if tld.len() < 2 || !tld.chars().all(|c| c.is_ascii_alphabetic()) {
        return false;
    }
    if !KNOWN_TLDS.contains(tld) && labels.len() < 3 {
        return false;
    }
    let labels_ok = rest.iter().all(|label| {
        !label.is_empty()
            && label.len() <= 63
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    if !labels_ok {
        return false;
    }
    // version-like: every label numeric or very short
    !rest
        .iter()
        .all(|label| label.len() <= 2 || label.chars().all(|c| c.is_ascii_digit() || c == '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(command: &str, output: &str) -> Vec<ExtractedFact> {
        RegexFactExtractor::new().unwrap().extract(command, output)
    }

    fn values(facts: &[ExtractedFact], kind: FactKind) -> Vec<&str> {
        facts
            .iter()
            .filter(|f| f.kind == kind)
            .map(|f| f.value.as_str())
            .collect()
    }

    const NMAP_OUTPUT: &str = "Starting Nmap 7.94\n\
        Nmap scan report for 10.10.10.5\n\
        PORT   STATE SERVICE VERSION\n\
        22/tcp open  ssh     OpenSSH 8.2p1\n\
        80/tcp open  http    Apache httpd 2.4.41\n\
        OS details: Linux 5.0 - 5.4\n";

    #[test]
    fn nmap_services_hosts_os_and_tool() {
        let facts = extract("nmap -sV 10.10.10.5", NMAP_OUTPUT);
        assert_eq!(values(&facts, FactKind::Service), vec!["22/tcp/ssh", "80/tcp/http"]);
        assert_eq!(values(&facts, FactKind::Host), vec!["10.10.10.5"]);
        assert_eq!(values(&facts, FactKind::Os), vec!["Linux 5.0 - 5.4"]);
        assert_eq!(values(&facts, FactKind::Tool), vec!["nmap"]);
    }

    #[test]
    fn version_numbers_are_not_hosts() {
        let facts = extract("pip --version", "pip 1.2.3.4 from /usr/lib");
        assert!(values(&facts, FactKind::Host).is_empty());
        let facts = extract("echo", "300.1.1.1");
        assert!(values(&facts, FactKind::Host).is_empty());
    }

    #[test]
    fn domains_filtered_by_tld_and_extension() {
        let facts = extract(
            "cat notes.txt",
            "target app.box.htb, see README.md and user.email and example.com",
        );
        let hosts = values(&facts, FactKind::Host);
        assert!(hosts.contains(&"app.box.htb"));
        assert!(hosts.contains(&"example.com"));
        assert!(!hosts.contains(&"notes.txt"));
        assert!(!hosts.contains(&"readme.md"));
        assert!(!hosts.contains(&"user.email"));
    }

    #[test]
    fn networks_from_cidr() {
        let facts = extract("nmap -sn 10.10.10.0/24", "");
        assert_eq!(values(&facts, FactKind::Network), vec!["10.10.10.0/24"]);
        assert!(values(&extract("x 10.0.0.0/40", ""), FactKind::Network).is_empty());
    }

    #[test]
    fn gobuster_paths() {
        let facts = extract(
            "gobuster dir -u http://10.10.10.5 -w common.txt",
            "/admin                (Status: 301) [Size: 178]\n/index.php            (Status: 200)\n",
        );
        assert_eq!(values(&facts, FactKind::WebPath), vec!["/admin", "/index.php"]);
    }

    #[test]
    fn sqlmap_and_nikto_vulnerabilities() {
        let facts = extract(
            "sqlmap -u http://t/?id=1",
            "[INFO] GET parameter 'id' is 'AND boolean-based blind' injectable",
        );
        assert_eq!(values(&facts, FactKind::Vulnerability), vec!["sql_injection"]);

        let facts = extract("nikto -h t", "+ OSVDB-3092: /admin/: This might be interesting");
        assert_eq!(values(&facts, FactKind::Vulnerability), vec!["nikto_findings"]);

        // the same text from an unrelated tool is not a finding
        assert!(values(&extract("cat log", "is vulnerable"), FactKind::Vulnerability).is_empty());
    }

    #[test]
    fn credentials_from_hydra_and_config_lines() {
        let facts = extract(
            "hydra -l admin -P rockyou.txt ssh://10.10.10.5",
            "[22][ssh] host: 10.10.10.5   login: admin   password: s3cret!\n",
        );
        assert_eq!(values(&facts, FactKind::Credential), vec!["admin:s3cret!"]);

        let facts = extract("cat wp-config.php", "define('DB_PASSWORD', 'x');\ndb password = hunter2\n");
        assert_eq!(values(&facts, FactKind::Credential), vec!["hunter2"]);
    }

    #[test]
    fn password_prompt_is_not_a_credential() {
        let facts = extract("ssh root@10.10.10.5", "root@10.10.10.5's password: \n");
        assert!(values(&facts, FactKind::Credential).is_empty());
    }

    #[test]
    fn flags_are_captured() {
        let facts = extract("cat user.txt", "HTB{p0rt_sc4n_m4st3r}\nflag{x}\n");
        assert_eq!(values(&facts, FactKind::Flag), vec!["HTB{p0rt_sc4n_m4st3r}", "flag{x}"]);
    }

    #[test]
    fn facts_are_deduplicated_within_one_event() {
        let facts = extract("ping 10.10.10.5", "from 10.10.10.5\nfrom 10.10.10.5\n");
        assert_eq!(values(&facts, FactKind::Host), vec!["10.10.10.5"]);
    }

    #[test]
    fn extraction_is_deterministic() {
        let extractor = RegexFactExtractor::new().unwrap();
        assert_eq!(
            extractor.extract("nmap -sV 10.10.10.5", NMAP_OUTPUT),
            extractor.extract("nmap -sV 10.10.10.5", NMAP_OUTPUT)
        );
    }

    #[test]
    fn program_skips_wrappers_and_assignments() {
        assert_eq!(command_program("sudo -E nmap -p- t"), Some("nmap"));
        assert_eq!(command_program("HTTP_PROXY=x proxychains4 /usr/bin/curl t"), Some("curl"));
        assert_eq!(command_program("   "), None);
    }

    #[test]
    fn categories() {
        assert_eq!(categorize_command("sudo nmap -sV t"), "port_scan");
        assert_eq!(categorize_command("ffuf -u http://t/FUZZ"), "web_enumeration");
        assert_eq!(categorize_command("cat hash | john --stdin"), "password_attack");
        assert_eq!(categorize_command("rsync -a a b"), "general");
        assert_eq!(categorize_command("ssh user@t"), "ssh");
    }
}
