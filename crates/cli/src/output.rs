//! Output formatting for CLI responses

use anyhow::Error;
use colored::*;
use panelstream_catalog::PanelModel;
use panelstream_engine::{DiscoveredDevice, SessionStatus};
use panelstream_errors::SessionError;
use serde_json::{Value, json};

use crate::commands::probe::ProbeReport;

fn print_json(value: &Value, what: &str) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Failed to format {} as JSON: {}", what, e),
    }
}

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": format!("{error:#}"),
            "type": error_type_name(error)
        }
    });
    print_json(&error_json, "error");
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

fn error_type_name(error: &Error) -> String {
    format!("{:?}", error)
        .split('(')
        .next()
        .unwrap_or("Unknown")
        .to_string()
}

/// Print the model catalog
pub fn print_models(models: &[PanelModel], json: bool) {
    if json {
        print_json(&json!({ "success": true, "models": models }), "model list");
        return;
    }

    println!("{}", "Supported Panels:".bold());
    for model in models {
        let (w, h) = model.render_size();
        println!(
            "  {} {} ({})",
            "●".cyan(),
            model.name.bold(),
            format!("{:04x}:{:04x}", model.vendor_id, model.product_id).dimmed()
        );
        println!(
            "    {} {}x{} native, {}x{} render, {:?}",
            model.transport, model.native_width, model.native_height, w, h, model.pixel_format
        );
    }
}

/// Print discovery results
pub fn print_discovered(devices: &[DiscoveredDevice], json: bool) {
    if json {
        print_json(&json!({ "success": true, "devices": devices }), "device list");
        return;
    }

    if devices.is_empty() {
        println!("{}", "No panels found".yellow());
        return;
    }

    println!("{}", "Attached Panels:".bold());
    for device in devices {
        let marker = if device.permission_denied {
            "●".red()
        } else if device.model.is_some() {
            "●".green()
        } else {
            "●".yellow()
        };
        println!(
            "  {} {} ({})",
            marker,
            device.display_name().bold(),
            device.location.dimmed()
        );
        println!("    Transport: {}", device.transport);
        if device.model.is_none() && !device.candidates.is_empty() {
            let names: Vec<String> = device.candidates.iter().map(|id| format!("{id:?}")).collect();
            println!("    Candidates: {} (probe to confirm)", names.join(", "));
        }
        if device.permission_denied {
            println!(
                "    {} install udev rules or run with access to {}",
                "Permission denied:".red(),
                device.location
            );
        }
    }
}

/// Print a handshake report
pub fn print_probe(report: &ProbeReport, json: bool) {
    if json {
        print_json(&json!({ "success": true, "probe": report }), "probe result");
        return;
    }

    println!("{} {}", "Panel:".bold(), report.model.name);
    println!("  Location: {} ({})", report.location, report.transport);
    let (w, h) = report.model.render_size();
    println!("  Render size: {}x{}", w, h);
    if let Some(identifier) = &report.identifier {
        println!("  Identifier: {}", identifier);
    }
    if let Some(mode) = report.mode_byte {
        println!("  Mode byte: 0x{:02x}", mode);
    }
    let how = match report.resolution {
        panelstream_engine::Resolution::Handshake => "confirmed by handshake".green(),
        panelstream_engine::Resolution::Fallback => "handshake inconclusive, best guess".yellow(),
    };
    println!("  Resolution: {} after {} attempt(s)", how, report.attempts);
}

fn start_result_json(id: &str, result: &Result<SessionStatus, SessionError>) -> Value {
    match result {
        Ok(status) => json!({ "device_id": id, "started": true, "status": status }),
        Err(e) => json!({ "device_id": id, "started": false, "error": e.to_string() }),
    }
}

/// Print per-device start results
pub fn print_start_results(results: &[(String, Result<SessionStatus, SessionError>)], json: bool) {
    if json {
        let sessions: Vec<Value> = results.iter().map(|(id, r)| start_result_json(id, r)).collect();
        print_json(&json!({ "success": true, "sessions": sessions }), "start results");
        return;
    }

    for (id, result) in results {
        match result {
            Ok(status) => println!(
                "  {} {} → {} at {} fps",
                "✓".green(),
                id.bold(),
                status.resolved_display_name,
                status.target_fps
            ),
            Err(e) => println!("  {} {}: {}", "✗".red(), id.bold(), e),
        }
    }
}

/// One status line per running session
pub fn print_status_line(statuses: &[(String, SessionStatus)]) {
    for (id, status) in statuses {
        let state = if status.is_running {
            "running".green()
        } else {
            "stopped".red()
        };
        print!(
            "{} [{}] {:.1} fps, {:.1} ms, sent {}, dropped {}",
            id.bold(),
            state,
            status.frame_rate,
            status.frame_time_ms,
            status.frames_sent,
            status.frames_dropped
        );
        match &status.last_error {
            Some(err) => println!(" {}", err.yellow()),
            None => println!(),
        }
    }
}

/// Final per-session outcome after stopping
pub fn print_run_summary(stopped: &[(String, Result<SessionStatus, SessionError>)], json: bool) {
    if json {
        let sessions: Vec<Value> = stopped
            .iter()
            .map(|(id, r)| match r {
                Ok(status) => json!({ "device_id": id, "status": status }),
                Err(e) => json!({ "device_id": id, "error": e.to_string() }),
            })
            .collect();
        print_json(&json!({ "success": true, "sessions": sessions }), "run summary");
        return;
    }

    println!("{}", "Session Summary:".bold());
    for (id, result) in stopped {
        match result {
            Ok(status) => println!(
                "  {} sent {} frames, dropped {}{}",
                id.bold(),
                status.frames_sent,
                status.frames_dropped,
                status
                    .last_error
                    .as_deref()
                    .map(|e| format!(", last error: {e}"))
                    .unwrap_or_default()
            ),
            Err(e) => println!("  {} {}", id.bold(), e.to_string().red()),
        }
    }
}
