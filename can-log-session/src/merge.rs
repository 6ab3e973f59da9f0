//! Concatenation of recordings into one session
//!
//! Recordings are appended in the order given. The first recording's start
//! time becomes the session start; later recordings are shifted by the
//! difference of their start times, and further if needed so that no group's
//! time axis runs backwards.

use crate::formats::load_log_file;
use crate::session::{ChannelGroup, LogSession};
use crate::types::{Result, SessionError};
use std::collections::HashMap;
use std::path::Path;

/// Load and concatenate log files in the given order
pub fn concatenate<P: AsRef<Path>>(paths: &[P]) -> Result<LogSession> {
    if paths.is_empty() {
        return Err(SessionError::NoInput);
    }

    let sessions = paths
        .iter()
        .map(|p| load_log_file(p.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    concatenate_sessions(sessions)
}

/// Concatenate in-memory sessions in the given order
pub fn concatenate_sessions(sessions: Vec<LogSession>) -> Result<LogSession> {
    let count = sessions.len();
    let mut iter = sessions.into_iter();
    let mut merged = iter.next().ok_or(SessionError::NoInput)?;
    merged.validate()?;

    for (index, next) in iter.enumerate() {
        next.validate()?;
        append(&mut merged, next, index + 1)?;
    }

    if count > 1 {
        merged.header.comment = Some(format!("Concatenation of {} recordings", count));
    }
    log::info!(
        "Concatenated {} recordings into {} groups",
        count,
        merged.groups.len()
    );
    Ok(merged)
}

fn append(merged: &mut LogSession, next: LogSession, index: usize) -> Result<()> {
    for group in &next.groups {
        if let Some(existing) = merged.group(&group.name) {
            check_compatible(existing, group, index)?;
        }
    }

    let start_delta = seconds_between(merged, &next);
    let mut offset = start_delta;
    for group in &next.groups {
        let last = merged
            .group(&group.name)
            .and_then(|g| g.timestamps.last().copied());
        if let (Some(last), Some(&first)) = (last, group.timestamps.first()) {
            if first + offset < last {
                offset = last - first;
            }
        }
    }
    if offset != start_delta {
        log::warn!(
            "Recording #{} overlaps the previous ones, shifting by {:.6}s instead of {:.6}s",
            index,
            offset,
            start_delta
        );
    }

    for group in next.groups {
        let shifted = group.timestamps.iter().map(|t| t + offset);
        match merged.groups.iter_mut().find(|g| g.name == group.name) {
            Some(existing) => {
                existing.timestamps.extend(shifted);
                for channel in &group.channels {
                    if let Some(target) = existing
                        .channels
                        .iter_mut()
                        .find(|c| c.name == channel.name)
                    {
                        target.samples.append(&channel.samples);
                    }
                }
            }
            None => {
                log::debug!("Group '{}' first seen in recording #{}", group.name, index);
                let timestamps = shifted.collect();
                merged.groups.push(ChannelGroup {
                    timestamps,
                    ..group
                });
            }
        }
    }

    Ok(())
}

/// Channel names and sample kinds must agree for groups to be appended
fn check_compatible(existing: &ChannelGroup, incoming: &ChannelGroup, index: usize) -> Result<()> {
    let layout = |g: &ChannelGroup| {
        g.channels
            .iter()
            .map(|c| (c.name.clone(), c.samples.kind()))
            .collect::<HashMap<_, _>>()
    };

    if layout(existing) != layout(incoming) {
        return Err(SessionError::LogFormat(format!(
            "Recording #{} has an incompatible layout for group '{}'",
            index, existing.name
        )));
    }
    Ok(())
}

fn seconds_between(first: &LogSession, next: &LogSession) -> f64 {
    let delta = next.start_time() - first.start_time();
    match delta.num_nanoseconds() {
        Some(ns) => ns as f64 / 1_000_000_000.0,
        None => delta.num_milliseconds() as f64 / 1_000.0,
    }
}
