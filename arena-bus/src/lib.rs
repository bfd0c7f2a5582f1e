//! Message-bus command protocol for the arena locator.
//!
//! This crate is the seam between the vision core and whatever transport
//! carries commands: the broker adapter (MQTT, websocket, …) feeds raw
//! payloads into [`handle_arena_message`] and supplies a [`BusPublisher`]
//! for replies. Malformed payloads, unknown commands, and unknown robot
//! ids are dropped without a reply, so a misbehaving client cannot wedge
//! the pipeline.

use tracing::debug;

use arena_processor::ArenaLocator;
use arena_types::{
    ArenaCommand, LocReply, RobotMap, RobotsMessage, ARENA_TOPIC, LOCATION_TOPIC, MAIN_TOPIC,
};

/// Outbound half of a bus adapter.
pub trait BusPublisher {
    fn publish(&mut self, topic: &str, payload: String);
}

/// A publisher that keeps everything in memory. Handy in tests and as the
/// default sink when no broker is configured.
#[derive(Debug, Default)]
pub struct VecPublisher {
    pub messages: Vec<(String, String)>,
}

impl BusPublisher for VecPublisher {
    fn publish(&mut self, topic: &str, payload: String) {
        self.messages.push((topic.to_string(), payload));
    }
}

/// A publisher that logs outbound traffic instead of sending it anywhere.
#[derive(Debug, Default)]
pub struct LogPublisher;

impl BusPublisher for LogPublisher {
    fn publish(&mut self, topic: &str, payload: String) {
        debug!("bus publish {topic}: {payload}");
    }
}

/// Handle one inbound bus message.
///
/// `robots` is the most recently published robot map, which is what `loc`
/// and `getAllRobots` answer from (not a fresh detection pass).
pub fn handle_arena_message(
    locator: &mut ArenaLocator,
    robots: &RobotMap,
    topic: &str,
    payload: &[u8],
    publisher: &mut dyn BusPublisher,
) {
    if topic != ARENA_TOPIC {
        return;
    }
    let command: ArenaCommand = match serde_json::from_slice(payload) {
        Ok(command) => command,
        Err(e) => {
            debug!("ignoring bus payload: {e}");
            return;
        }
    };

    match command {
        ArenaCommand::Loc { bot_id } => {
            let Some(pose) = robots.get(&bot_id) else {
                debug!("loc request for unknown robot {bot_id}");
                return;
            };
            let reply = LocReply { loc: *pose };
            let payload = serde_json::to_string(&reply).expect("serializing reply");
            publisher.publish(&format!("{MAIN_TOPIC}{bot_id}"), payload);
        }
        ArenaCommand::SetColor { bot_id, color } => {
            if !robots.contains_key(&bot_id) {
                debug!("setColor for unknown robot {bot_id}");
                return;
            }
            locator.set_bot_color(bot_id, color);
        }
        ArenaCommand::EnableCrosshairs { state } => {
            locator.enable_crosshair_display(state.is_on());
        }
        ArenaCommand::GetAllRobots { reply_to } => {
            let reply = RobotsMessage {
                robots: robots.clone(),
            };
            let payload = serde_json::to_string(&reply).expect("serializing reply");
            publisher.publish(&format!("{MAIN_TOPIC}{reply_to}"), payload);
        }
    }
}

/// Publish the whole robot map on `pixelbot/location`, as the driver does
/// once per second.
pub fn publish_locations(robots: &RobotMap, publisher: &mut dyn BusPublisher) {
    let message = RobotsMessage {
        robots: robots.clone(),
    };
    let payload = serde_json::to_string(&message).expect("serializing locations");
    publisher.publish(LOCATION_TOPIC, payload);
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_camera::SimCamera;
    use arena_params::ParamStore;
    use arena_processor::LocatorConfig;
    use arena_types::{Rgb, RobotPose};

    fn locator() -> ArenaLocator {
        let camera = SimCamera::uniform(32, 32, [0, 0, 0]);
        ArenaLocator::new(
            Box::new(camera),
            ParamStore::new(),
            LocatorConfig::default(),
        )
        .unwrap()
    }

    fn robots() -> RobotMap {
        let mut map = RobotMap::new();
        map.insert(
            3,
            RobotPose {
                x_mm: 100,
                y_mm: 200,
                heading: Some(90),
            },
        );
        map
    }

    #[test]
    fn loc_command_replies_on_the_robot_topic() {
        let mut locator = locator();
        let mut publisher = VecPublisher::default();
        handle_arena_message(
            &mut locator,
            &robots(),
            ARENA_TOPIC,
            br#"{"cmd":"loc","botId":3}"#,
            &mut publisher,
        );
        assert_eq!(publisher.messages.len(), 1);
        let (topic, payload) = &publisher.messages[0];
        assert_eq!(topic, "pixelbot/3");
        assert_eq!(payload, r#"{"loc":[100,200,90]}"#);
        locator.stop();
    }

    #[test]
    fn loc_for_unknown_robot_is_silent() {
        let mut locator = locator();
        let mut publisher = VecPublisher::default();
        handle_arena_message(
            &mut locator,
            &robots(),
            ARENA_TOPIC,
            br#"{"cmd":"loc","botId":7}"#,
            &mut publisher,
        );
        assert!(publisher.messages.is_empty());
        locator.stop();
    }

    #[test]
    fn other_topics_are_not_for_us() {
        let mut locator = locator();
        let mut publisher = VecPublisher::default();
        handle_arena_message(
            &mut locator,
            &robots(),
            "pixelbot/other",
            br#"{"cmd":"loc","botId":3}"#,
            &mut publisher,
        );
        assert!(publisher.messages.is_empty());
        locator.stop();
    }

    #[test]
    fn malformed_and_unknown_commands_are_dropped() {
        let mut locator = locator();
        let mut publisher = VecPublisher::default();
        for payload in [
            &b"not json"[..],
            &br#"{"cmd":"dance"}"#[..],
            &br#"{"cmd":"loc"}"#[..],
            &br#"{"noCmd":1}"#[..],
        ] {
            handle_arena_message(&mut locator, &robots(), ARENA_TOPIC, payload, &mut publisher);
        }
        assert!(publisher.messages.is_empty());
        locator.stop();
    }

    #[test]
    fn set_color_touches_only_known_robots() {
        let mut locator = locator();
        let mut publisher = VecPublisher::default();
        handle_arena_message(
            &mut locator,
            &robots(),
            ARENA_TOPIC,
            br#"{"cmd":"setColor","botId":3,"color":[1,2,3]}"#,
            &mut publisher,
        );
        assert_eq!(locator.bot_color(3), Some(Rgb(1, 2, 3)));

        // robot 9 is not in the published map: ignored
        handle_arena_message(
            &mut locator,
            &robots(),
            ARENA_TOPIC,
            br#"{"cmd":"setColor","botId":9,"color":[1,2,3]}"#,
            &mut publisher,
        );
        assert_eq!(locator.bot_color(9), None);
        locator.stop();
    }

    #[test]
    fn crosshair_toggle_round_trip() {
        let mut locator = locator();
        let mut publisher = VecPublisher::default();
        handle_arena_message(
            &mut locator,
            &RobotMap::new(),
            ARENA_TOPIC,
            br#"{"cmd":"enableCrosshairs","state":"on"}"#,
            &mut publisher,
        );
        assert!(locator.crosshair_display_enabled());
        handle_arena_message(
            &mut locator,
            &RobotMap::new(),
            ARENA_TOPIC,
            br#"{"cmd":"enableCrosshairs","state":"off"}"#,
            &mut publisher,
        );
        assert!(!locator.crosshair_display_enabled());
        locator.stop();
    }

    #[test]
    fn get_all_robots_replies_on_the_requested_subtopic() {
        let mut locator = locator();
        let mut publisher = VecPublisher::default();
        handle_arena_message(
            &mut locator,
            &robots(),
            ARENA_TOPIC,
            br#"{"cmd":"getAllRobots","replyTo":"game"}"#,
            &mut publisher,
        );
        assert_eq!(publisher.messages.len(), 1);
        let (topic, payload) = &publisher.messages[0];
        assert_eq!(topic, "pixelbot/game");
        assert_eq!(payload, r#"{"robots":{"3":[100,200,90]}}"#);
        locator.stop();
    }

    #[test]
    fn location_broadcast_uses_the_location_topic() {
        let mut publisher = VecPublisher::default();
        publish_locations(&robots(), &mut publisher);
        assert_eq!(publisher.messages.len(), 1);
        assert_eq!(publisher.messages[0].0, LOCATION_TOPIC);
    }
}
