//! Decides whether an inbound message is addressed to the bot.

/// The message this one replies to, when it could be resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepliedTo {
    pub author_is_self: bool,
    pub has_embeds: bool,
}

/// Facts about one inbound message.
#[derive(Debug, Clone, Default)]
pub struct MessageFacts<'a> {
    pub author_is_bot: bool,
    pub has_stickers: bool,
    pub is_dm: bool,
    pub channel_is_active: bool,
    /// Message text with mentions already resolved to display names.
    pub text: &'a str,
    pub mentions_bot: bool,
    pub mentions_everyone: bool,
    pub replied_to: Option<RepliedTo>,
}

/// Settings that shape eligibility.
#[derive(Debug, Clone, Copy)]
pub struct ResponsePolicy<'a> {
    pub allow_dm: bool,
    pub smart_mention: bool,
    pub trigger_words: &'a [String],
    pub bot_name: &'a str,
}

/// Whether the bot should answer the message described by `facts`.
pub fn should_respond(facts: &MessageFacts<'_>, policy: &ResponsePolicy<'_>) -> bool {
    if facts.has_stickers || facts.author_is_bot {
        return false;
    }

    // Replies only count when they continue a plain bot message.
    if let Some(replied_to) = facts.replied_to
        && (!replied_to.author_is_self || replied_to.has_embeds)
    {
        return false;
    }

    if facts.is_dm {
        return policy.allow_dm;
    }

    facts.channel_is_active
        || contains_trigger_word(facts.text, policy.trigger_words)
        || (policy.smart_mention && is_smart_mention(facts, policy.bot_name))
}

fn contains_trigger_word(text: &str, trigger_words: &[String]) -> bool {
    trigger_words
        .iter()
        .filter(|word| !word.is_empty())
        .any(|word| text.contains(word.as_str()))
}

fn is_smart_mention(facts: &MessageFacts<'_>, bot_name: &str) -> bool {
    let mentioned = facts.mentions_bot && !facts.mentions_everyone;
    let replied = facts.replied_to.is_some();
    let named = !bot_name.is_empty() && facts.text.to_lowercase().contains(&bot_name.to_lowercase());
    mentioned || replied || named
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(trigger_words: &[String]) -> ResponsePolicy<'_> {
        ResponsePolicy {
            allow_dm: true,
            smart_mention: true,
            trigger_words,
            bot_name: "Relay",
        }
    }

    fn guild_message(text: &str) -> MessageFacts<'_> {
        MessageFacts {
            text,
            ..Default::default()
        }
    }

    #[test]
    fn hello_bot_with_trigger_word_qualifies() {
        let words = vec!["bot".to_string()];
        assert!(should_respond(&guild_message("hello bot"), &policy(&words)));
        assert!(!should_respond(&guild_message("hello there"), &policy(&words)));
    }

    #[test]
    fn bot_authors_and_stickers_never_qualify() {
        let words = vec!["bot".to_string()];
        let base = MessageFacts {
            is_dm: true,
            channel_is_active: true,
            text: "bot Relay",
            mentions_bot: true,
            ..Default::default()
        };

        let from_bot = MessageFacts {
            author_is_bot: true,
            ..base.clone()
        };
        let with_sticker = MessageFacts {
            has_stickers: true,
            ..base.clone()
        };

        for facts in [from_bot, with_sticker] {
            for is_dm in [true, false] {
                let facts = MessageFacts { is_dm, ..facts.clone() };
                assert!(!should_respond(&facts, &policy(&words)));
            }
        }
    }

    #[test]
    fn dm_responds_iff_allowed() {
        let words = vec!["hi".to_string()];
        let dm = MessageFacts {
            is_dm: true,
            text: "hi",
            ..Default::default()
        };

        assert!(should_respond(&dm, &policy(&words)));
        let closed = ResponsePolicy {
            allow_dm: false,
            ..policy(&words)
        };
        assert!(!should_respond(&dm, &closed));
    }

    #[test]
    fn trigger_word_qualifies_in_any_guild_channel() {
        let words = vec!["bot".to_string()];
        let quiet = ResponsePolicy {
            smart_mention: false,
            ..policy(&words)
        };
        for channel_is_active in [true, false] {
            let facts = MessageFacts {
                channel_is_active,
                text: "hey bot",
                ..Default::default()
            };
            assert!(should_respond(&facts, &quiet));
        }
    }

    #[test]
    fn trigger_words_are_case_sensitive_and_empty_ones_ignored() {
        let words = vec![String::new(), "Bot".to_string()];
        let quiet = ResponsePolicy {
            smart_mention: false,
            ..policy(&words)
        };
        assert!(!should_respond(&guild_message("hello bot"), &quiet));
        assert!(should_respond(&guild_message("hello Bot"), &quiet));
    }

    #[test]
    fn mentions_require_smart_mention_and_exclude_everyone() {
        let facts = MessageFacts {
            text: "@someone",
            mentions_bot: true,
            ..Default::default()
        };
        assert!(should_respond(&facts, &policy(&[])));

        let everyone = MessageFacts {
            mentions_everyone: true,
            ..facts.clone()
        };
        assert!(!should_respond(&everyone, &policy(&[])));

        let quiet = ResponsePolicy {
            smart_mention: false,
            ..policy(&[])
        };
        assert!(!should_respond(&facts, &quiet));
    }

    #[test]
    fn replies_only_continue_plain_bot_messages() {
        let reply = |author_is_self, has_embeds| MessageFacts {
            text: "and then?",
            replied_to: Some(RepliedTo {
                author_is_self,
                has_embeds,
            }),
            ..Default::default()
        };

        assert!(should_respond(&reply(true, false), &policy(&[])));
        assert!(!should_respond(&reply(true, true), &policy(&[])));
        assert!(!should_respond(&reply(false, false), &policy(&[])));

        // A reply to someone else is excluded even in an active channel.
        let active = MessageFacts {
            channel_is_active: true,
            ..reply(false, false)
        };
        assert!(!should_respond(&active, &policy(&[])));
    }

    #[test]
    fn bot_name_matches_case_insensitively() {
        assert!(should_respond(&guild_message("is RELAY awake?"), &policy(&[])));
    }
}
