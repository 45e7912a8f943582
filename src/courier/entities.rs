use std::collections::HashMap;

use super::transport::{WireEntity, WireEntityKind};
use super::types::{EntityKind, Peer, PeerId, TextEntity};

/// Converts text entities to their request form.
///
/// `TextMention` entities are resolved against `associated_peers`; a mention
/// whose peer is unknown or not an addressable user is dropped.
pub(crate) fn wire_entities(
    entities: &[TextEntity],
    associated_peers: &HashMap<PeerId, Peer>,
) -> Vec<WireEntity> {
    entities
        .iter()
        .filter_map(|entity| {
            let kind = match &entity.kind {
                EntityKind::Bold => WireEntityKind::Bold,
                EntityKind::Italic => WireEntityKind::Italic,
                EntityKind::Underline => WireEntityKind::Underline,
                EntityKind::Strikethrough => WireEntityKind::Strike,
                EntityKind::Spoiler => WireEntityKind::Spoiler,
                EntityKind::Code => WireEntityKind::Code,
                EntityKind::Pre(language) => {
                    WireEntityKind::Pre(language.clone().unwrap_or_default())
                }
                EntityKind::Url => WireEntityKind::Url,
                EntityKind::TextUrl(url) => WireEntityKind::TextUrl(url.clone()),
                EntityKind::Email => WireEntityKind::Email,
                EntityKind::PhoneNumber => WireEntityKind::Phone,
                EntityKind::Mention => WireEntityKind::Mention,
                EntityKind::Hashtag => WireEntityKind::Hashtag,
                EntityKind::BotCommand => WireEntityKind::BotCommand,
                EntityKind::TextMention(peer_id) => {
                    let user = associated_peers.get(peer_id).and_then(Peer::input_user);
                    if user.is_none() {
                        tracing::debug!(
                            target: "courier::entities",
                            "Dropping mention of unresolved peer {}",
                            peer_id
                        );
                    }
                    WireEntityKind::InputMentionName(user?)
                }
            };
            Some(WireEntity {
                offset: entity.offset,
                length: entity.length,
                kind,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::courier::transport::InputUser;
    use crate::courier::types::{GroupPeer, UserPeer};

    fn user(id: i64, access_hash: Option<i64>) -> Peer {
        Peer::User(UserPeer {
            id,
            access_hash,
            first_name: None,
            last_name: None,
            username: None,
        })
    }

    #[test]
    fn resolves_mentions_of_known_users() {
        let peers = HashMap::from([(PeerId::user(11), user(11, Some(99)))]);
        let entities = vec![
            TextEntity::new(0, 5, EntityKind::Pre(None)),
            TextEntity::new(6, 3, EntityKind::TextMention(PeerId::user(11))),
        ];

        let wire = wire_entities(&entities, &peers);

        assert_eq!(
            wire,
            vec![
                WireEntity {
                    offset: 0,
                    length: 5,
                    kind: WireEntityKind::Pre(String::new()),
                },
                WireEntity {
                    offset: 6,
                    length: 3,
                    kind: WireEntityKind::InputMentionName(InputUser {
                        user_id: 11,
                        access_hash: 99,
                    }),
                },
            ]
        );
    }

    #[test]
    fn drops_mentions_that_cannot_be_addressed() {
        let peers = HashMap::from([
            (PeerId::user(12), user(12, None)),
            (
                PeerId::group(13),
                Peer::Group(GroupPeer {
                    id: 13,
                    title: "Ops".to_string(),
                }),
            ),
        ]);
        let entities = vec![
            TextEntity::new(0, 2, EntityKind::TextMention(PeerId::user(12))),
            TextEntity::new(3, 2, EntityKind::TextMention(PeerId::group(13))),
            TextEntity::new(6, 2, EntityKind::TextMention(PeerId::user(14))),
            TextEntity::new(9, 4, EntityKind::Italic),
        ];

        let wire = wire_entities(&entities, &peers);

        assert_eq!(wire.len(), 1);
        assert_eq!(wire[0].kind, WireEntityKind::Italic);
    }
}
