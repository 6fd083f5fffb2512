use reqwest::{header, Client};
use std::collections::HashMap;
use url::Url;

/// Parsed robots.txt rules for the `*` user-agent group.
#[derive(Debug, Clone, Default)]
pub struct Robots {
    pub allows: Vec<String>,
    pub disallows: Vec<String>,
    pub crawl_delay_ms: Option<u64>,
}

/// Minimal parser for the '*' group.
pub fn parse_robots(txt: &str) -> Robots {
    let mut active = false;
    let mut robots = Robots::default();
    for line in txt.lines() {
        let l = line.trim();
        if l.is_empty() || l.starts_with('#') {
            continue;
        }
        if let Some((k, v)) = l.split_once(':') {
            let key = k.trim().to_lowercase();
            let val = v.trim();
            match key.as_str() {
                "user-agent" => active = val == "*",
                "allow" if active => robots.allows.push(val.to_string()),
                "disallow" if active => robots.disallows.push(val.to_string()),
                "crawl-delay" if active => {
                    if let Ok(n) = val.parse::<f64>() {
                        robots.crawl_delay_ms = Some((n * 1000.0) as u64);
                    }
                }
                _ => {}
            }
        }
    }
    robots
}

/// Longest matching Allow vs Disallow wins; unmatched paths are allowed.
pub fn path_allowed(path: &str, rules: &Robots) -> bool {
    let mut best_allow: Option<&str> = None;
    let mut best_dis: Option<&str> = None;
    for a in &rules.allows {
        if path.starts_with(a.as_str()) && best_allow.map_or(true, |p| a.len() > p.len()) {
            best_allow = Some(a);
        }
    }
    for d in &rules.disallows {
        if d == "/" {
            best_dis = Some(d);
            continue;
        }
        if path.starts_with(d.as_str()) && best_dis.map_or(true, |p| d.len() > p.len()) {
            best_dis = Some(d);
        }
    }
    match (best_allow, best_dis) {
        (Some(a), Some(d)) => a.len() >= d.len(),
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (None, None) => true,
    }
}

/// Per-host robots.txt cache. Rules are fetched once per host; an
/// unreachable or missing robots.txt is treated as allow-all.
#[derive(Default)]
pub struct RobotsCache {
    rules: HashMap<String, Robots>,
}

impl RobotsCache {
    pub async fn allowed(&mut self, client: &Client, url: &Url, user_agent: &str) -> bool {
        let Some(host) = url.host_str() else { return false };
        if !self.rules.contains_key(host) {
            let robots_url = format!("{}://{}/robots.txt", url.scheme(), host);
            let txt = match client
                .get(&robots_url)
                .header(header::USER_AGENT, user_agent)
                .send()
                .await
            {
                Ok(resp) if resp.status().is_success() => resp.text().await.unwrap_or_default(),
                _ => String::new(),
            };
            self.rules.insert(host.to_string(), parse_robots(&txt));
        }
        let rules = &self.rules[host];
        path_allowed(url.path(), rules)
    }

    pub fn crawl_delay_ms(&self, host: &str) -> Option<u64> {
        self.rules.get(host).and_then(|r| r.crawl_delay_ms)
    }
}
