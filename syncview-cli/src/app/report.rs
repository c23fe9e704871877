use syncview_core::{
    BulkResult, ChannelStatus, ViewEntity, ViewList, WebReaction, format_eta, format_rate,
    format_size,
};

/// One line per entity: status, percent and name, plus sizes, rate and
/// ETA when `details` is set
pub fn entity_line(entity: &ViewEntity, details: bool) -> String {
    let mut line = format!(
        "{:<11} {:>4}%  {}",
        entity.status.as_str(),
        entity.percent_downloaded,
        entity.name
    );
    if details {
        line.push_str(&format!(
            "  [{} / {}]",
            format_size(entity.local_size),
            format_size(entity.remote_size)
        ));
        if let Some(rate) = entity.download_rate.filter(|r| *r > 0) {
            line.push_str(&format!("  {}", format_rate(rate)));
        }
        if let Some(eta) = entity.eta.filter(|e| *e > 0) {
            line.push_str(&format!("  eta {}", format_eta(eta)));
        }
    }
    line
}

/// Lines describing how `next` differs from `prev`: `+` added, `-` removed,
/// `~` changed
pub fn diff_lines(prev: &ViewList, next: &ViewList, details: bool) -> Vec<String> {
    let mut lines = Vec::new();

    for entity in next.iter() {
        match prev.find(&entity.name) {
            None => lines.push(format!("+ {}", entity_line(entity, details))),
            Some(old) if changed(old, entity) => {
                lines.push(format!("~ {}", entity_line(entity, details)))
            }
            Some(_) => {}
        }
    }
    for entity in prev.iter() {
        if next.find(&entity.name).is_none() {
            lines.push(format!("- {}", entity.name));
        }
    }
    lines
}

fn changed(old: &ViewEntity, new: &ViewEntity) -> bool {
    old.status != new.status
        || old.percent_downloaded != new.percent_downloaded
        || old.local_size != new.local_size
        || old.remote_size != new.remote_size
}

pub fn status_line(status: ChannelStatus) -> String {
    match status {
        ChannelStatus::Stopped => "stopped".to_string(),
        ChannelStatus::Connecting => "connecting".to_string(),
        ChannelStatus::Connected => "connected".to_string(),
        ChannelStatus::Reconnecting { retry_in } => {
            format!("disconnected, retrying in {}", format_eta(retry_in.as_secs()))
        }
    }
}

pub fn reaction_line(action: &str, name: &str, reaction: &WebReaction) -> String {
    if reaction.success {
        format!("{} {}: ok", action, name)
    } else {
        format!(
            "{} {}: failed: {}",
            action,
            name,
            reaction.error_message.as_deref().unwrap_or("unknown error")
        )
    }
}

/// Summary line followed by one line per failed file
pub fn bulk_lines(result: &BulkResult) -> Vec<String> {
    if !result.success {
        return vec![format!(
            "{} failed: {}",
            result.action,
            result.error_message.as_deref().unwrap_or("unknown error")
        )];
    }

    let mut lines = Vec::new();
    if let Some(summary) = result.summary() {
        let outcome = if result.all_succeeded() {
            "done"
        } else {
            "partially failed"
        };
        lines.push(format!(
            "{} {}: {} of {} succeeded, {} failed",
            result.action, outcome, summary.succeeded, summary.total, summary.failed
        ));
    }
    for failure in result.failures() {
        lines.push(format!(
            "  {}: {}",
            failure.file,
            failure.error.as_deref().unwrap_or("failed")
        ));
    }
    lines
}
