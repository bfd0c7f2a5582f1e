//! Shared types for the arena robot locator.
//!
//! These are the types that cross crate boundaries: robot identities, render
//! colors, and the JSON wire format spoken on the message bus.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Prefix of every bus topic.
pub const MAIN_TOPIC: &str = "pixelbot/";
/// Topic on which inbound commands arrive.
pub const ARENA_TOPIC: &str = "pixelbot/arena";
/// Topic on which the driver publishes all robot locations once per second.
pub const LOCATION_TOPIC: &str = "pixelbot/location";

/// A robot identity, equal to the number of id dots on its top face.
pub type RobotId = u8;

/// An RGB render color. Serializes as a three-element `[r, g, b]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Millimetre position and nautical heading of one robot.
///
/// On the wire this is the `[x_mm, y_mm, heading]` triple used in `loc`
/// replies and the `robots` map. A robot whose direction marker was missed
/// this frame has a `null` heading element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(i32, i32, Option<u16>)", into = "(i32, i32, Option<u16>)")]
pub struct RobotPose {
    pub x_mm: i32,
    pub y_mm: i32,
    pub heading: Option<u16>,
}

impl From<(i32, i32, Option<u16>)> for RobotPose {
    fn from((x_mm, y_mm, heading): (i32, i32, Option<u16>)) -> Self {
        Self { x_mm, y_mm, heading }
    }
}

impl From<RobotPose> for (i32, i32, Option<u16>) {
    fn from(orig: RobotPose) -> Self {
        (orig.x_mm, orig.y_mm, orig.heading)
    }
}

/// All robots located in the most recent processed frame.
pub type RobotMap = BTreeMap<RobotId, RobotPose>;

/// Payload of `pixelbot/location` and of `getAllRobots` replies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotsMessage {
    pub robots: RobotMap,
}

/// Payload of a reply to a single-robot `loc` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocReply {
    pub loc: RobotPose,
}

/// `"on"` / `"off"` toggle state used by overlay commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchState {
    #[serde(rename = "on")]
    On,
    #[serde(rename = "off")]
    Off,
}

impl SwitchState {
    pub fn is_on(&self) -> bool {
        matches!(self, SwitchState::On)
    }
}

/// A command heard on the `pixelbot/arena` topic.
///
/// The JSON payload is keyed by `cmd`. Payloads with an unknown `cmd` or
/// with missing fields fail to deserialize and are silently dropped by the
/// dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd")]
pub enum ArenaCommand {
    #[serde(rename = "loc")]
    Loc {
        #[serde(rename = "botId")]
        bot_id: RobotId,
    },
    #[serde(rename = "setColor")]
    SetColor {
        #[serde(rename = "botId")]
        bot_id: RobotId,
        color: Rgb,
    },
    #[serde(rename = "enableCrosshairs")]
    EnableCrosshairs { state: SwitchState },
    #[serde(rename = "getAllRobots")]
    GetAllRobots {
        #[serde(rename = "replyTo")]
        reply_to: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_loc_command() {
        let cmd: ArenaCommand = serde_json::from_str(r#"{"cmd":"loc","botId":3}"#).unwrap();
        assert_eq!(cmd, ArenaCommand::Loc { bot_id: 3 });
    }

    #[test]
    fn parse_set_color() {
        let cmd: ArenaCommand =
            serde_json::from_str(r#"{"cmd":"setColor","botId":2,"color":[10,20,30]}"#).unwrap();
        assert_eq!(
            cmd,
            ArenaCommand::SetColor {
                bot_id: 2,
                color: Rgb(10, 20, 30)
            }
        );
    }

    #[test]
    fn unknown_command_is_error() {
        assert!(serde_json::from_str::<ArenaCommand>(r#"{"cmd":"dance"}"#).is_err());
    }

    #[test]
    fn missing_field_is_error() {
        assert!(serde_json::from_str::<ArenaCommand>(r#"{"cmd":"loc"}"#).is_err());
    }

    #[test]
    fn pose_wire_format() {
        let pose = RobotPose {
            x_mm: 120,
            y_mm: -4,
            heading: Some(90),
        };
        assert_eq!(serde_json::to_string(&pose).unwrap(), "[120,-4,90]");
        let pose = RobotPose {
            x_mm: 0,
            y_mm: 0,
            heading: None,
        };
        assert_eq!(serde_json::to_string(&pose).unwrap(), "[0,0,null]");
    }

    #[test]
    fn robots_message_round_trip() {
        let mut robots = RobotMap::new();
        robots.insert(
            2,
            RobotPose {
                x_mm: 100,
                y_mm: 200,
                heading: Some(45),
            },
        );
        let msg = RobotsMessage { robots };
        let buf = serde_json::to_string(&msg).unwrap();
        assert_eq!(buf, r#"{"robots":{"2":[100,200,45]}}"#);
        let back: RobotsMessage = serde_json::from_str(&buf).unwrap();
        assert_eq!(back, msg);
    }
}
