//! Shared helpers for engine integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use chrono::Utc;

use flagcaddy_engine::{AdvisoryClient, DisabledAdvisor, RecommendationEngine, RegexFactExtractor};
use flagcaddy_ledger::SqliteStore;
use flagcaddy_pilot::CapturedEvent;
use flagcaddy_types::{EngineSettings, SessionName};

pub const NMAP_COMMAND: &str = "nmap -sV 10.10.10.5";

pub const NMAP_OUTPUT: &str = "Starting Nmap 7.94 ( https://nmap.org )\r\n\
Nmap scan report for 10.10.10.5\r\n\
Host is up (0.031s latency).\r\n\
PORT   STATE SERVICE VERSION\r\n\
22/tcp open  ssh     OpenSSH 8.2p1 Ubuntu 4ubuntu0.5\r\n\
80/tcp open  http    Apache httpd 2.4.41\r\n\
\r\n\
Nmap done: 1 IP address (1 host up) scanned in 8.52 seconds\r\n";

/// Advisor that records every prompt and answers with a fixed reply.
#[derive(Clone, Default)]
pub struct ScriptedAdvisor {
    pub reply: String,
    pub prompts: Rc<RefCell<Vec<String>>>,
}

impl ScriptedAdvisor {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Rc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.borrow().len()
    }
}

impl AdvisoryClient for ScriptedAdvisor {
    fn enabled(&self) -> bool {
        true
    }

    fn run(&self, prompt: &str) -> String {
        self.prompts.borrow_mut().push(prompt.to_string());
        self.reply.clone()
    }
}

pub fn settings() -> EngineSettings {
    EngineSettings::default()
}

pub fn session() -> SessionName {
    SessionName::parse("lab-box").unwrap()
}

pub fn engine_with(advisor: Box<dyn AdvisoryClient>, settings: EngineSettings) -> RecommendationEngine {
    RecommendationEngine::new(
        Box::new(SqliteStore::open_in_memory().unwrap()),
        Box::new(RegexFactExtractor::new().unwrap()),
        advisor,
        settings,
        &session(),
    )
    .unwrap()
}

pub fn disabled_engine() -> RecommendationEngine {
    engine_with(Box::new(DisabledAdvisor), settings())
}

pub fn captured(command: &str, output: &str) -> CapturedEvent {
    let now = Utc::now();
    CapturedEvent {
        command: command.to_string(),
        raw_input: format!("{command}\r"),
        output: output.to_string(),
        started_at: now,
        finished_at: now,
    }
}
