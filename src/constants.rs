// Measurements
pub const MEMBERS_MEASUREMENT: &str = "members";
pub const EVENTS_MEASUREMENT: &str = "events";

// Fields
pub const FIELD_MEMBER_COUNT: &str = "member_count";
pub const FIELD_COUNT: &str = "count";

// Tags
pub const TAG_EVENT_TYPE: &str = "event_type";
pub const TAG_CHANNEL_ID: &str = "channel_id";
pub const TAG_GUILD_ID: &str = "guild_id";
pub const TAG_USER_ID: &str = "user_id";

// Typed event names
pub const MESSAGE_CREATE: &str = "messageCreate";
pub const GUILD_MEMBER_ADD: &str = "guildMemberAdd";
pub const GUILD_MEMBER_REMOVE: &str = "guildMemberRemove";

// Gateway dispatch names
pub const DISPATCH_MESSAGE_CREATE: &str = "MESSAGE_CREATE";
pub const DISPATCH_GUILD_MEMBER_ADD: &str = "GUILD_MEMBER_ADD";
pub const DISPATCH_GUILD_MEMBER_REMOVE: &str = "GUILD_MEMBER_REMOVE";
pub const DISPATCH_GUILD_CREATE: &str = "GUILD_CREATE";
pub const DISPATCH_GUILD_DELETE: &str = "GUILD_DELETE";
pub const DISPATCH_READY: &str = "READY";

pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// GUILDS | GUILD_MEMBERS | GUILD_MESSAGES
pub const DEFAULT_GATEWAY_INTENTS: u64 = (1 << 0) | (1 << 1) | (1 << 9);

pub const DEFAULT_WRITE_QUEUE_CAPACITY: usize = 1024;
pub const DEFAULT_PROVISION_MAX_ATTEMPTS: u32 = 5;

