//! Post-processing of generator output.
//!
//! ```text
//! GenerationResult.files ──► normalize_files ──► empty? ──► fallback_scaffold
//! assistantMessage ──► sanitize_assistant_message ──► transcript
//! ```

use devassist_sandbox::SandboxFile;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::services::GeneratedFile;

/// Paths written by [`fallback_scaffold`].
pub const FALLBACK_PATHS: [&str; 3] = ["README.md", ".env.example", "server/proxy.js"];

/// Replies longer than this are replaced by the build summary.
pub const MAX_REPLY_CHARS: usize = 900;

/// Code-looking lines tolerated in a reply.
pub const MAX_CODE_LINES: usize = 2;

static FILE_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^---\s+.+\s+---").expect("file header regex must compile"));
static CODE_LINE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(import\s+|export\s+|const\s+|function\s+|class\s+|<\w+|\{\s*$)")
        .expect("code line regex must compile")
});

/// Drop entries without a path, strip leading `../` and `/` segments, and
/// de-duplicate by path keeping the last occurrence in its original slot.
pub fn normalize_files(files: &[GeneratedFile]) -> Vec<SandboxFile> {
    let mut out: Vec<SandboxFile> = Vec::with_capacity(files.len());

    for file in files {
        let Some(raw) = file.path.as_deref() else {
            continue;
        };
        let mut path = raw.trim();
        while let Some(rest) = path.strip_prefix("../") {
            path = rest;
        }
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            continue;
        }

        let content = file.content.clone().unwrap_or_default();
        match out.iter_mut().find(|existing| existing.path == path) {
            Some(existing) => existing.content = content,
            None => out.push(SandboxFile::new(path, content)),
        }
    }

    out
}

/// Minimal project written when generation yields no usable files.
pub fn fallback_scaffold(goal: &str) -> Vec<SandboxFile> {
    vec![
        SandboxFile::new(FALLBACK_PATHS[0], fallback_readme(goal)),
        SandboxFile::new(FALLBACK_PATHS[1], FALLBACK_ENV),
        SandboxFile::new(FALLBACK_PATHS[2], FALLBACK_PROXY),
    ]
}

/// Keep a generator reply only if it reads like prose.
pub fn sanitize_assistant_message(message: Option<&str>, fallback: &str) -> String {
    let text = message.map(str::trim).unwrap_or("");
    if text.is_empty() {
        return fallback.to_string();
    }

    let has_fence = text.contains("```");
    let has_file_header = FILE_HEADER_RE.is_match(text);
    let code_lines = CODE_LINE_RE.find_iter(text).count();

    if has_fence || has_file_header || code_lines > MAX_CODE_LINES || text.chars().count() > MAX_REPLY_CHARS {
        return fallback.to_string();
    }
    text.to_string()
}

/// Summary reply used when the generator's own message is unusable.
pub fn build_summary(file_count: usize) -> String {
    format!("Built project and wrote {} file(s) to the project folder.", file_count)
}

fn fallback_readme(goal: &str) -> String {
    format!(
        r#"# Devassist Project

## Goal
{goal}

## What you got
- A real file scaffold written into the project folder
- A local proxy example for real-time Places data (CORS-safe, keeps the API key server side)

## Real-time data
Browser calls to Google Places Web Service endpoints often fail due to CORS and expose your API key.
Use the included proxy (`server/proxy.js`) and keep the key in `.env`.

## Run
1) Copy env:
   - cp .env.example .env
   - set GOOGLE_PLACES_API_KEY

2) Start proxy:
   - node server/proxy.js

3) Serve frontend locally:
   - python -m http.server 5173
   - open http://localhost:5173
"#
    )
}

const FALLBACK_ENV: &str = r#"# DO NOT COMMIT REAL KEYS

GOOGLE_PLACES_API_KEY=YOUR_KEY_HERE
PORT=8787
"#;

const FALLBACK_PROXY: &str = r#"/**
 * Minimal Node proxy for Google Places Web Service.
 * Run: node server/proxy.js
 * Frontend calls: http://localhost:8787/api/places/nearby?lat=..&lng=.. and /api/places/details?placeId=..
 *
 * Requires Node 18+ (global fetch).
 */
import http from "http";
import { URL } from "url";

const PORT = Number(process.env.PORT || 8787);
const API_KEY = process.env.GOOGLE_PLACES_API_KEY;

if (!API_KEY) {
  console.error("Missing GOOGLE_PLACES_API_KEY. Create a .env file from .env.example");
  process.exit(1);
}

const CORS = {
  "access-control-allow-origin": "*",
  "access-control-allow-methods": "GET,OPTIONS",
  "access-control-allow-headers": "content-type",
};

function sendJson(res, status, obj) {
  res.writeHead(status, { "content-type": "application/json; charset=utf-8", ...CORS });
  res.end(JSON.stringify(obj));
}

function send(res, status, text) {
  res.writeHead(status, { "content-type": "text/plain; charset=utf-8", ...CORS });
  res.end(text);
}

async function forward(res, upstream) {
  upstream.searchParams.set("key", API_KEY);
  try {
    const r = await fetch(upstream.toString());
    return sendJson(res, 200, await r.json());
  } catch (e) {
    return sendJson(res, 500, { error: "upstream fetch failed" });
  }
}

const server = http.createServer(async (req, res) => {
  if (req.method === "OPTIONS") return send(res, 204, "");
  if (req.method !== "GET") return send(res, 405, "method not allowed");

  const url = new URL(req.url, "http://localhost");

  if (url.pathname === "/api/places/nearby") {
    const lat = url.searchParams.get("lat");
    const lng = url.searchParams.get("lng");
    if (!lat || !lng) return sendJson(res, 400, { error: "lat,lng required" });

    const upstream = new URL("https://maps.googleapis.com/maps/api/place/nearbysearch/json");
    upstream.searchParams.set("location", lat + "," + lng);
    upstream.searchParams.set("radius", url.searchParams.get("radius") || "1500");
    upstream.searchParams.set("keyword", url.searchParams.get("keyword") || "restaurant");
    return forward(res, upstream);
  }

  if (url.pathname === "/api/places/details") {
    const placeId = url.searchParams.get("placeId");
    if (!placeId) return sendJson(res, 400, { error: "placeId required" });

    const upstream = new URL("https://maps.googleapis.com/maps/api/place/details/json");
    upstream.searchParams.set("place_id", placeId);
    upstream.searchParams.set("fields", "name,formatted_address,rating,opening_hours,website,formatted_phone_number");
    return forward(res, upstream);
  }

  return send(res, 404, "not found");
});

server.listen(PORT, () => {
  console.log("Proxy listening on", PORT);
});
"#;
