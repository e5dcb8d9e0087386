//! Passive replies and their XML serialization.
//!
//! A reply travels back in the HTTP response of the callback that carried the
//! message. It is addressed from the receiving account to the sending user,
//! i.e. with `ToUserName`/`FromUserName` swapped relative to the message.

use std::time::{SystemTime, UNIX_EPOCH};

use super::message::Message;

/// Maximum number of articles WeChat renders in one news reply.
pub const MAX_ARTICLES: usize = 10;

/// Content type of serialized replies.
pub const REPLY_CONTENT_TYPE: &str = "application/xml";

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text {
        content: String,
    },
    Image {
        media_id: String,
    },
    Voice {
        media_id: String,
    },
    Video {
        media_id: String,
        title: Option<String>,
        description: Option<String>,
    },
    Music {
        title: String,
        description: String,
        url: String,
        hq_url: String,
        thumb_media_id: Option<String>,
    },
    Articles(Vec<Article>),
    /// Hand the conversation over to the customer service system
    TransferCustomerService,
}

/// One entry of a news reply.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Article {
    pub title: String,
    pub description: String,
    pub img: String,
    pub url: String,
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Reply::Text {
            content: content.into(),
        }
    }

    /// WeChat `MsgType` of the serialized reply.
    pub fn msg_type(&self) -> &'static str {
        match self {
            Reply::Text { .. } => "text",
            Reply::Image { .. } => "image",
            Reply::Voice { .. } => "voice",
            Reply::Video { .. } => "video",
            Reply::Music { .. } => "music",
            Reply::Articles(_) => "news",
            Reply::TransferCustomerService => "transfer_customer_service",
        }
    }

    /// Serialize the reply with explicit addressing and creation time.
    pub fn render(&self, target: &str, source: &str, time: i64) -> String {
        let mut xml = String::from("<xml>");
        element(&mut xml, "ToUserName", target);
        element(&mut xml, "FromUserName", source);
        xml.push_str(&format!("<CreateTime>{time}</CreateTime>"));
        element(&mut xml, "MsgType", self.msg_type());

        match self {
            Reply::Text { content } => element(&mut xml, "Content", content),
            Reply::Image { media_id } => {
                xml.push_str("<Image>");
                element(&mut xml, "MediaId", media_id);
                xml.push_str("</Image>");
            }
            Reply::Voice { media_id } => {
                xml.push_str("<Voice>");
                element(&mut xml, "MediaId", media_id);
                xml.push_str("</Voice>");
            }
            Reply::Video {
                media_id,
                title,
                description,
            } => {
                xml.push_str("<Video>");
                element(&mut xml, "MediaId", media_id);
                if let Some(title) = title {
                    element(&mut xml, "Title", title);
                }
                if let Some(description) = description {
                    element(&mut xml, "Description", description);
                }
                xml.push_str("</Video>");
            }
            Reply::Music {
                title,
                description,
                url,
                hq_url,
                thumb_media_id,
            } => {
                xml.push_str("<Music>");
                element(&mut xml, "Title", title);
                element(&mut xml, "Description", description);
                element(&mut xml, "MusicUrl", url);
                element(&mut xml, "HQMusicUrl", hq_url);
                if let Some(thumb) = thumb_media_id {
                    element(&mut xml, "ThumbMediaId", thumb);
                }
                xml.push_str("</Music>");
            }
            Reply::Articles(articles) => {
                let articles = &articles[..articles.len().min(MAX_ARTICLES)];
                xml.push_str(&format!("<ArticleCount>{}</ArticleCount><Articles>", articles.len()));
                for article in articles {
                    xml.push_str("<item>");
                    element(&mut xml, "Title", &article.title);
                    element(&mut xml, "Description", &article.description);
                    element(&mut xml, "PicUrl", &article.img);
                    element(&mut xml, "Url", &article.url);
                    xml.push_str("</item>");
                }
                xml.push_str("</Articles>");
            }
            Reply::TransferCustomerService => {}
        }

        xml.push_str("</xml>");
        xml
    }
}

/// Serialize `reply` as the answer to `message`, stamped with the current time.
pub fn create_reply(reply: &Reply, message: &Message) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64;
    reply.render(&message.source, &message.target, now)
}

fn element(xml: &mut String, name: &str, value: &str) {
    xml.push_str(&format!("<{name}>"));
    push_cdata(xml, value);
    xml.push_str(&format!("</{name}>"));
}

/// Wrap `value` in CDATA, splitting any `]]>` across two sections.
fn push_cdata(xml: &mut String, value: &str) {
    xml.push_str("<![CDATA[");
    xml.push_str(&value.replace("]]>", "]]]]><![CDATA[>"));
    xml.push_str("]]>");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::robot::message::parse_user_msg;

    #[test]
    fn test_render_text() {
        let xml = Reply::text("hello").render("o_user", "gh_robot", 1400000000);
        assert_eq!(
            xml,
            "<xml><ToUserName><![CDATA[o_user]]></ToUserName>\
             <FromUserName><![CDATA[gh_robot]]></FromUserName>\
             <CreateTime>1400000000</CreateTime>\
             <MsgType><![CDATA[text]]></MsgType>\
             <Content><![CDATA[hello]]></Content></xml>"
        );
    }

    #[test]
    fn test_render_escapes_cdata_terminator() {
        let xml = Reply::text("a]]>b").render("u", "r", 0);
        assert!(xml.contains("<Content><![CDATA[a]]]]><![CDATA[>b]]></Content>"));
    }

    #[test]
    fn test_render_articles_capped() {
        let articles = vec![
            Article {
                title: "t".to_string(),
                ..Default::default()
            };
            12
        ];
        let xml = Reply::Articles(articles).render("u", "r", 0);
        assert!(xml.contains("<MsgType><![CDATA[news]]></MsgType>"));
        assert!(xml.contains("<ArticleCount>10</ArticleCount>"));
        assert_eq!(xml.matches("<item>").count(), MAX_ARTICLES);
    }

    #[test]
    fn test_render_music_without_thumb() {
        let xml = Reply::Music {
            title: "song".to_string(),
            description: "desc".to_string(),
            url: "http://example.com/a.mp3".to_string(),
            hq_url: "http://example.com/a-hq.mp3".to_string(),
            thumb_media_id: None,
        }
        .render("u", "r", 0);
        assert!(xml.contains("<HQMusicUrl><![CDATA[http://example.com/a-hq.mp3]]></HQMusicUrl>"));
        assert!(!xml.contains("ThumbMediaId"));
    }

    #[test]
    fn test_render_transfer_customer_service() {
        let xml = Reply::TransferCustomerService.render("u", "r", 0);
        assert!(xml.ends_with("<MsgType><![CDATA[transfer_customer_service]]></MsgType></xml>"));
    }

    #[test]
    fn test_create_reply_swaps_addressing() {
        let message = parse_user_msg(
            b"<xml><ToUserName>gh_robot</ToUserName><FromUserName>o_user</FromUserName>\
              <CreateTime>1</CreateTime><MsgType>text</MsgType><Content>hi</Content></xml>",
        )
        .unwrap();

        let xml = create_reply(&Reply::Image { media_id: "m".to_string() }, &message);
        assert!(xml.starts_with("<xml><ToUserName><![CDATA[o_user]]></ToUserName><FromUserName><![CDATA[gh_robot]]></FromUserName>"));
        assert!(xml.contains("<Image><MediaId><![CDATA[m]]></MediaId></Image>"));

        // The serialized reply is itself a well-formed envelope
        let echoed = parse_user_msg(xml.as_bytes()).unwrap();
        assert_eq!(echoed.target, "o_user");
        assert_eq!(echoed.source, "gh_robot");
    }
}
